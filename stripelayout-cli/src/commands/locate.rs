//! Locate Command
//!
//! Shows where a logical file offset lands in the striped layout.

use anyhow::Result;
use console::style;
use stripelayout_core::StripingConfig;

/// Run locate command
pub fn run(config: &StripingConfig, offsets: &[u64]) -> Result<()> {
    println!(
        "{}",
        style(format!(
            "Layout: cell {} B, {} data + {} parity, {} stripes/block",
            config.cell_size(), config.data_blocks(), config.parity_blocks(), config.stripes_per_block()
        ))
        .dim()
    );
    println!();
    println!(
        "{:>14}  {:>6}  {:>5}  {:>6}  {:>8}  {:>10}",
        style("offset").bold(),
        style("group").bold(),
        style("block").bold(),
        style("stripe").bold(),
        style("in cell").bold(),
        style("in block").bold()
    );

    for &offset in offsets {
        let loc = config.locate(offset);
        // round trip through the inverse mapping
        let back = config.file_offset(loc.group, loc.block, loc.offset_in_block)?;
        anyhow::ensure!(
            back == offset,
            "layout inverse disagrees: {} maps back to {}",
            offset,
            back
        );

        println!(
            "{:>14}  {:>6}  {:>5}  {:>6}  {:>8}  {:>10}",
            offset,
            style(loc.group).cyan(),
            style(loc.block).cyan(),
            loc.stripe,
            loc.offset_in_cell,
            loc.offset_in_block
        );
    }

    Ok(())
}
