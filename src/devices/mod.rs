
// Currently all devices supported here are Keysight InfiniiVision oscilloscopes.  If multiple
// instrument families are ever supported, I'll probably organize them into modules by manufacturer

pub mod infiniivision;
