//! `#[derive(Bean)]` 实现

use proc_macro2::TokenStream;
use quote::quote;
use syn::{punctuated::Punctuated, DeriveInput, Path, Result, Token, Type};

/// `#[bean(...)]` 参数
#[derive(Default)]
struct BeanArgs {
    default: bool,
    constructor: Option<Path>,
    context_constructor: Option<Path>,
    provides: Vec<Type>,
    post_construct: bool,
    pre_destroy: bool,
    fragment: bool,
}

impl BeanArgs {
    fn from_input(input: &DeriveInput) -> Result<Self> {
        let mut args = Self::default();
        for attr in input.attrs.iter().filter(|a| a.path().is_ident("bean")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("default") {
                    args.default = true;
                } else if meta.path.is_ident("post_construct") {
                    args.post_construct = true;
                } else if meta.path.is_ident("pre_destroy") {
                    args.pre_destroy = true;
                } else if meta.path.is_ident("fragment") {
                    args.fragment = true;
                } else if meta.path.is_ident("constructor") {
                    args.constructor = Some(meta.value()?.parse()?);
                } else if meta.path.is_ident("context_constructor") {
                    args.context_constructor = Some(meta.value()?.parse()?);
                } else if meta.path.is_ident("provides") {
                    let content;
                    syn::parenthesized!(content in meta.input);
                    let types = Punctuated::<Type, Token![,]>::parse_terminated(&content)?;
                    args.provides.extend(types);
                } else {
                    return Err(meta.error(
                        "未知的 bean 参数, 可用: default, constructor, context_constructor, provides, post_construct, pre_destroy, fragment",
                    ));
                }
                Ok(())
            })?;
        }
        Ok(args)
    }
}

/// 生成组件描述
pub fn derive_bean_impl(input: DeriveInput) -> Result<TokenStream> {
    let args = BeanArgs::from_input(&input)?;
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let mut steps = Vec::new();
    if args.default {
        steps.push(quote! { .with_default() });
    }
    if let Some(ctor) = &args.constructor {
        steps.push(quote! { .constructor(#ctor) });
    }
    if let Some(ctor) = &args.context_constructor {
        steps.push(quote! { .context_constructor(#ctor) });
    }
    for ty in &args.provides {
        steps.push(quote! {
            .provides::<#ty>(|bean: ::std::sync::Arc<Self>| -> ::std::sync::Arc<#ty> { bean })
        });
    }
    if args.post_construct {
        steps.push(quote! { .post_construct() });
    }
    if args.pre_destroy {
        steps.push(quote! { .pre_destroy() });
    }
    if args.fragment {
        steps.push(quote! { .fragment() });
    }

    Ok(quote! {
        impl #impl_generics ::di_abstractions::Bean for #name #ty_generics #where_clause {
            fn descriptor() -> ::di_abstractions::BeanDescriptor<Self> {
                ::di_abstractions::BeanDescriptor::<Self>::new() #(#steps)*
            }
        }
    })
}
