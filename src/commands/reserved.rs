use console::style;
use miette::Result;

pub fn run(command: &str) -> Result<()> {
    println!(
        "  {} is not available yet. Use {} to scaffold from a template.",
        style(format!("stencil {command}")).cyan(),
        style("stencil init").cyan()
    );
    Ok(())
}
