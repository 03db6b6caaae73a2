//! `#[derive(Injectable)]` 实现

use crate::utils::{is_inject_type, named_fields, parse_field_mode, FieldMode};
use proc_macro2::TokenStream;
use quote::quote;
use syn::{parse_quote, Data, DeriveInput, Error, Fields, Result};

/// 生成注入点表
pub fn derive_injectable_impl(mut input: DeriveInput) -> Result<TokenStream> {
    let name = input.ident.clone();
    let Data::Struct(data) = &input.data else {
        return Err(Error::new_spanned(&input.ident, "Injectable 只能用于结构体"));
    };
    // 单元结构体没有注入点
    let fields = match &data.fields {
        Fields::Unit => None,
        other => Some(named_fields(other).ok_or_else(|| {
            Error::new_spanned(&input.ident, "Injectable 只能用于具名字段结构体或单元结构体")
        })?),
    };

    let mut steps = Vec::new();
    for field in fields.iter().flat_map(|fields| &fields.named) {
        let Some(ident) = &field.ident else {
            continue;
        };
        let label = ident.to_string();
        match parse_field_mode(&field.attrs)? {
            FieldMode::Skip => {}
            FieldMode::Inherit => steps.push(quote! { .inherit(#label, |s| &s.#ident) }),
            FieldMode::Auto => {
                if is_inject_type(&field.ty) {
                    steps.push(quote! { .slot(#label, |s| &s.#ident) });
                }
            }
        }
    }

    input
        .generics
        .make_where_clause()
        .predicates
        .push(parse_quote!(Self: ::core::marker::Send + ::core::marker::Sync + 'static));
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::di_abstractions::Injectable for #name #ty_generics #where_clause {
            fn injection_points() -> ::di_abstractions::InjectionPoints<Self> {
                ::di_abstractions::InjectionPoints::<Self>::new() #(#steps)*
            }
        }
    })
}
