use eventbus::{Event, EventType};

#[derive(Event)]
#[event(name = "envelope")]
struct Envelope<T: Send + Sync + 'static> {
    payload: T,
}

fn main() {
    assert_eq!(Envelope::<u8>::event_name(), "envelope");
    assert_ne!(EventType::of::<Envelope<u8>>(), EventType::of::<Envelope<String>>());

    let ev = Envelope { payload: 5u8 };
    assert_eq!(ev.payload, 5);
}
