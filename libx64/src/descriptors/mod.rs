mod call_gate;
mod code;
mod data;
pub mod interrupt;
mod system;

pub use call_gate::CallGateDescriptor;
pub use code::CodeSegmentDescriptor;
pub use data::DataSegmentDescriptor;
pub use interrupt::InterruptGateDescriptor;
pub use system::{SystemSegmentDescriptor, SystemSegmentType};

pub struct GdtNull;
