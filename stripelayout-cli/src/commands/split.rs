//! Split Command
//!
//! Shows how a block group of a given logical length is divided into its
//! internal data and parity blocks.

use anyhow::Result;
use console::style;
use stripelayout_core::{
    split_block_group, BlockRole, BlockToken, ExtendedBlock, LocatedBlockGroup, StorageLocation,
    StripingConfig,
};

/// Split configuration
pub struct SplitConfig {
    pub group_bytes: u64,
    pub block_id: u64,
}

/// Run split command
pub fn run(config: &StripingConfig, split: SplitConfig) -> Result<()> {
    let width = config.total_blocks();
    let group = LocatedBlockGroup {
        block: ExtendedBlock::new("BP-cli", split.block_id, split.group_bytes, 1),
        start_offset: 0,
        locations: (0..width)
            .map(|i| StorageLocation::new(format!("node-{}", i), format!("127.0.0.1:{}", 9866 + i)))
            .collect(),
        block_indices: (0..width).map(|i| i as u8).collect(),
        token: BlockToken::default(),
    };

    let blocks = split_block_group(&group, config)?;

    println!(
        "{}",
        style(format!("Block group of {} bytes", split.group_bytes))
            .bold()
            .underlined()
    );
    println!();

    for block in blocks.iter().flatten() {
        let role = match block.role {
            BlockRole::Data => style("data  ").green(),
            BlockRole::Parity => style("parity").magenta(),
        };
        let len = if block.block.num_bytes == 0 {
            style(block.block.num_bytes.to_string()).dim()
        } else {
            style(block.block.num_bytes.to_string()).cyan()
        };
        println!(
            "  [{:>3}] {} {}  {:>10} bytes  start {}",
            block.index_in_group, role, block.block, len, block.start_offset
        );
    }

    Ok(())
}
