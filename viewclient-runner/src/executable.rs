cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix;
        pub use self::unix::*;
    } else {
        mod generic;
        pub use self::generic::*;
    }
}
