use eventbus::Event;

#[derive(Event)]
enum Status {
    Active,
}

fn main() {
    let _ = Status::Active;
}
