use proc_macro::TokenStream;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, LitStr, Result, parse_macro_input};

/// #[derive(Event)] 宏实现
/// - 枚举与联合体直接报错：事件类型只能是结构体
/// - 名称优先取 `#[event(name = "...")]`，否则为结构体标识符
pub(crate) fn expand(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    if !matches!(input.data, Data::Struct(_)) {
        return syn::Error::new(
            input.ident.span(),
            "#[derive(Event)] can only be used on struct types",
        )
        .to_compile_error()
        .into();
    }

    let name = match parse_event_name(&input.attrs) {
        Ok(name) => name,
        Err(err) => return err.to_compile_error().into(),
    };

    let ident = &input.ident;
    let name_lit = name.unwrap_or_else(|| LitStr::new(&ident.to_string(), ident.span()));
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let expanded = quote! {
        impl #impl_generics ::eventbus::Event for #ident #ty_generics #where_clause {
            fn event_name() -> &'static str {
                #name_lit
            }
        }
    };

    TokenStream::from(expanded)
}

// 解析 #[event(name = "...")]，重复或未知参数报错
fn parse_event_name(attrs: &[Attribute]) -> Result<Option<LitStr>> {
    let mut name: Option<LitStr> = None;

    for attr in attrs.iter().filter(|a| a.path().is_ident("event")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                if name.is_some() {
                    return Err(meta.error("duplicate 'name' specified for this event"));
                }
                let lit: LitStr = meta.value()?.parse()?;
                if lit.value().trim().is_empty() {
                    return Err(syn::Error::new(lit.span(), "event name must not be empty"));
                }
                name = Some(lit);
                Ok(())
            } else {
                Err(meta.error("unsupported event attribute, expected `name = \"...\"`"))
            }
        })?;
    }

    Ok(name)
}
