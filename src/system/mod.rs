pub mod collector;
pub mod cpu;
pub mod kill;
pub mod meminfo;
pub mod process;
pub mod procfs;
