//! Pólya urn: draw an index, reinforce its weight, repeat. Rich colors
//! get richer; the final shares follow a flat Dirichlet.
//!
//! Run with: `cargo run --example polya --release`

use urns::DynamicProposalArray;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let colors = ["red", "green", "blue", "yellow"];
    let mut urn = DynamicProposalArray::new(&[1.0; 4])?;
    let mut rng = rand::rng();

    let rounds = 100_000usize;
    let mut counts = [0usize; 4];
    for _ in 0..rounds {
        let i = urn.sample(&mut rng);
        counts[i] += 1;
        let w = urn.weight(i).unwrap_or(0.0) + 1.0;
        urn.update(i, w)?;
    }

    println!("after {rounds} reinforced draws:");
    for (color, count) in colors.iter().zip(counts.iter()) {
        let share = 100.0 * *count as f64 / rounds as f64;
        println!("  {color:<6} {count:>7}  ({share:.1}%)");
    }
    println!("total weight: {:.0}", urn.total());
    Ok(())
}
