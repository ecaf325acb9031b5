pub mod allocator;

pub use allocator::{round_currency, RewardAllocation, RewardAllocator, ZoneCredit};
