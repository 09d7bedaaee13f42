pub(crate) use quartz_layout::test_support::{Aligned, heap_region};

pub(crate) fn unique_name(tag: &str) -> String {
    format!("quartz_test_{}_{tag}", std::process::id())
}
