use eventbus::Event;

#[derive(Event)]
#[event(name = "a", name = "b")]
struct Twice;

fn main() {
    let _ = Twice;
}
