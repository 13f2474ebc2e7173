use eventbus::{Event, EventType};

#[derive(Debug, Event)]
struct UserCreated {
    id: u64,
    email: String,
}

#[derive(Event)]
struct Heartbeat;

#[derive(Event)]
struct Tick(u64);

fn main() {
    assert_eq!(UserCreated::event_name(), "UserCreated");
    assert_eq!(Heartbeat::event_name(), "Heartbeat");
    assert_eq!(EventType::of::<Tick>().name(), "Tick");
    assert_ne!(EventType::of::<Tick>(), EventType::of::<Heartbeat>());

    let ev = UserCreated {
        id: 1,
        email: "a@b.c".into(),
    };
    assert_eq!(ev.id, 1);
    assert!(!ev.email.is_empty());
    let _ = Tick(3).0;
}
