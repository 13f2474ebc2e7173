use eventbus::Event;

#[derive(Event)]
#[event(name = "  ")]
struct Blank;

fn main() {
    let _ = Blank;
}
