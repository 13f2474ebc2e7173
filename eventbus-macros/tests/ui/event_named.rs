use eventbus::{AnyEvent, Event};

#[derive(Event)]
#[event(name = "order.placed")]
struct OrderPlaced {
    total: u32,
}

fn main() {
    assert_eq!(OrderPlaced::event_name(), "order.placed");

    let ev = AnyEvent::new(OrderPlaced { total: 12 });
    assert_eq!(ev.name(), "order.placed");
    assert_eq!(ev.downcast_ref::<OrderPlaced>().map(|o| o.total), Some(12));
}
