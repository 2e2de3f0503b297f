use anyhow::Result;
use clap::Args;

use crate::cli::output::Output;
use crate::parallel::PartitionPolicy;
use crate::parallel::partition::molecule_spans;

#[derive(Args)]
pub struct PartitionArgs {
    /// Number of atoms
    pub atoms: usize,

    /// Target number of molecules
    pub groups: usize,

    /// Partitioning policy
    #[arg(long, value_enum, default_value_t = PartitionPolicy::Linear)]
    pub policy: PartitionPolicy,

    /// Nested policy only: widest molecule last
    #[arg(long)]
    pub upper: bool,
}

pub fn execute(args: PartitionArgs, output: &Output) -> Result<()> {
    let boundaries = args.policy.partitioner(args.upper).partition(args.atoms, args.groups)?;

    let line: Vec<String> = boundaries.iter().map(ToString::to_string).collect();
    println!("{}", line.join(" "));

    output.verbose(&format!(
        "{} atoms in {} molecules ({} policy)",
        args.atoms,
        boundaries.len() - 1,
        args.policy
    ));
    for (position, (start, end)) in molecule_spans(&boundaries).enumerate() {
        output.verbose(&format!("molecule {position}: {start}..{end} ({} atoms)", end - start));
    }
    Ok(())
}
