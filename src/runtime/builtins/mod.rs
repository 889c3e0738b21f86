pub mod host_list;
pub mod iterators;
pub mod set;
