use mockall::mock;
use nvsim_core::common::{Clock, Request, Response};
use nvsim_core::stats::Dumper;
use nvsim_core::Component;

mock! {
    /// A [`Component`] double that lets a test dictate exactly what the
    /// next level accepts, without needing real media timing behind it.
    pub NextLevel {}

    impl Component for NextLevel {
        fn issue_request(&mut self, req: Request) -> Response;
        fn tick_current(&mut self, clk: Clock);
        fn tick_next(&mut self, clk: Clock);
        fn full(&self) -> bool;
        fn pending(&self) -> bool;
        fn drain_current(&mut self);
        fn drain_next(&mut self);
        fn print_counters(&self, dumper: &mut Dumper);
    }
}
