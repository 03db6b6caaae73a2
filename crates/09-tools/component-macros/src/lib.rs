//! # Component Macros
//!
//! 这个 crate 提供了生成注入元数据表和组件描述的派生宏。
//!
//! ## 核心宏
//!
//! - [`Injectable`] - 生成 `Injectable::injection_points`
//! - [`Bean`] - 生成 `Bean::descriptor`
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! use di_abstractions::{Bean, Inject, Injectable};
//!
//! #[derive(Default, Injectable, Bean)]
//! #[bean(default, provides(dyn Greeter), post_construct)]
//! pub struct GreetingService {
//!     clock: Inject<dyn Clock>,
//!     #[injectable(inherit)]
//!     base: BaseService,
//! }
//! ```

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

mod bean;
mod injectable;
mod utils;

/// 生成注入元数据表
///
/// 类型为 `Inject<..>` 的具名字段成为注入点，字段名即注入点名。
///
/// # 字段参数
///
/// - `#[injectable(inherit)]` - 继承内嵌结构的全部注入点，名称以字段名为前缀
/// - `#[injectable(skip)]` - 忽略该 `Inject` 字段
#[proc_macro_derive(Injectable, attributes(injectable))]
pub fn derive_injectable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    injectable::derive_injectable_impl(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// 生成组件描述
///
/// # 参数
///
/// - `default` - 使用 `Default` 作为无参构造函数
/// - `constructor = path` - 无参构造函数
/// - `context_constructor = path` - 接收平台上下文的构造函数
/// - `provides(dyn A, dyn B)` - 声明能力类型
/// - `post_construct` / `pre_destroy` - 启用生命周期回调
/// - `fragment` - 标记为碎片
#[proc_macro_derive(Bean, attributes(bean))]
pub fn derive_bean(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    bean::derive_bean_impl(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
