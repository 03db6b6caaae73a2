//! 宏工具函数

use syn::{Attribute, Fields, FieldsNamed, GenericArgument, PathArguments, Result, Type};

/// 字段上的 `#[injectable(...)]` 参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldMode {
    /// 按类型自动判断
    Auto,
    /// 继承内嵌结构的注入点
    Inherit,
    /// 忽略
    Skip,
}

/// 解析字段属性
pub fn parse_field_mode(attrs: &[Attribute]) -> Result<FieldMode> {
    let mut mode = FieldMode::Auto;
    for attr in attrs.iter().filter(|a| a.path().is_ident("injectable")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("inherit") {
                mode = FieldMode::Inherit;
                Ok(())
            } else if meta.path.is_ident("skip") {
                mode = FieldMode::Skip;
                Ok(())
            } else {
                Err(meta.error("未知的 injectable 参数, 可用: inherit, skip"))
            }
        })?;
    }
    Ok(mode)
}

/// 字段类型是否为 `Inject<..>`
pub fn is_inject_type(ty: &Type) -> bool {
    extract_generic_type(ty, "Inject").is_some()
}

/// 提取 `Wrapper<T>` 中的 `T`
pub fn extract_generic_type<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    args.args.iter().find_map(|arg| match arg {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    })
}

/// 具名字段
pub fn named_fields(fields: &Fields) -> Option<&FieldsNamed> {
    match fields {
        Fields::Named(named) => Some(named),
        _ => None,
    }
}
