// Writes the pipeboard man page(s) to the directory given as the first argument
// (default: ./man). One page for the top-level command, one per subcommand.

use clap::CommandFactory;
use clap_mangen::Man;
use pipeboard::cli::Cli;
use std::fs;
use std::path::{Path, PathBuf};

fn render(cmd: &clap::Command, name: &str, out_dir: &Path) -> std::io::Result<()> {
    let mut buffer: Vec<u8> = Vec::new();
    Man::new(cmd.clone()).title(name.to_uppercase()).render(&mut buffer)?;
    let path = out_dir.join(format!("{}.1", name));
    fs::write(&path, buffer)?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn main() -> std::io::Result<()> {
    let out_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("man"));
    fs::create_dir_all(&out_dir)?;

    let cmd = Cli::command();
    render(&cmd, "pipeboard", &out_dir)?;
    for sub in cmd.get_subcommands() {
        let name = format!("pipeboard-{}", sub.get_name());
        render(sub, &name, &out_dir)?;
    }
    Ok(())
}
