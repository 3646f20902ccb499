mod builder;

pub use builder::MyFreeCams;
