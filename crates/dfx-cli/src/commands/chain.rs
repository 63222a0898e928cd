use super::CmdResult;
use crate::{print_info, print_success};
use colored::*;
use dfx_core::Block;
use dfx_node::Node;
use std::path::Path;

pub fn generate(node: &Node, blocks: u64) -> CmdResult {
    let hashes = node.generate(blocks)?;
    for hash in &hashes {
        println!("{}", hash.to_hex());
    }
    print_success(&format!(
        "Mined {} block(s), height {}",
        hashes.len(),
        node.block_count()?
    ));
    Ok(())
}

pub fn block_count(node: &Node) -> CmdResult {
    println!("{}", node.block_count()?);
    Ok(())
}

pub fn best_block_hash(node: &Node) -> CmdResult {
    println!("{}", node.best_block_hash()?.to_hex());
    Ok(())
}

pub fn invalidate_tip(node: &Node) -> CmdResult {
    let hash = node.invalidate_tip()?;
    print_success(&format!("Disconnected {}", hash.to_hex().yellow()));
    Ok(())
}

pub fn export_chain(node: &Node, output: &Path) -> CmdResult {
    let blocks = node.blocks()?;
    std::fs::write(output, serde_json::to_string(&blocks)?)?;
    print_success(&format!(
        "Wrote {} blocks to {}",
        blocks.len(),
        output.display()
    ));
    Ok(())
}

pub fn accept_chain(node: &Node, input: &Path) -> CmdResult {
    let data = std::fs::read_to_string(input)?;
    let blocks: Vec<Block> = serde_json::from_str(&data)?;
    if node.accept_chain(&blocks)? {
        print_success(&format!("Switched to chain at height {}", node.block_count()?));
    } else {
        print_info("Active chain is at least as long, nothing to do");
    }
    Ok(())
}
