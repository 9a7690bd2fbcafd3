use std::time::Duration;

use rstest::rstest;

use ku::{
    memory::Virt,
    process::Trap,
};

use kernel::trap;

mod log;
mod mock;

#[ctor::ctor]
fn init() {
    log::init();
}

#[rstest]
#[should_panic(expected = "before a trap handler is installed")]
#[timeout(Duration::from_secs(1))]
fn deliver_without_handler() {
    let mut frame = mock::user_frame(Trap::Timer, mock::CODE, mock::STACK_TOP);
    trap::deliver(&mut frame, Virt::zero());
}
