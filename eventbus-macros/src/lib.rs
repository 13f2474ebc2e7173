use proc_macro::TokenStream;

mod event;

/// 事件派生宏
/// - 仅支持结构体（具名字段、元组、单元结构体均可）
/// - 生成 `::eventbus::Event` 实现
/// - 支持参数：`#[event(name = "...")]` 指定稳定名称，默认取类型名
#[proc_macro_derive(Event, attributes(event))]
pub fn derive_event(input: TokenStream) -> TokenStream {
    event::expand(input)
}
