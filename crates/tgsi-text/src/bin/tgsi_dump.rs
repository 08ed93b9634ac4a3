use std::env;
use std::fs;
use std::path::PathBuf;
use std::process;

use anyhow::{bail, Context};
use tgsi::DumpFlags;
use tgsi_text::{TranslateOptions, DEFAULT_MAX_TOKENS};
use tracing_subscriber::EnvFilter;

fn usage() -> &'static str {
    "\
tgsi_dump: translate TGSI assembly and print the resulting token stream

USAGE:
    cargo run -p tgsi-text --bin tgsi_dump -- <input> [FLAGS]

FLAGS:
    --verbose         Print every token field after each line
    --tokens          Input is a little-endian binary token file instead of text
    --out PATH        Write the translated tokens to PATH (little-endian)
    --max-tokens N    Token buffer size for translation (default 4096)
    --no-sanity       Skip the sanity check after translation
"
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = real_main() {
        eprintln!("error: {err:#}");
        process::exit(1);
    }
}

fn parse_count(flag: &str, v: &str) -> anyhow::Result<usize> {
    v.parse::<usize>()
        .with_context(|| format!("invalid {flag} value {v:?}"))
}

fn read_token_file(bytes: &[u8]) -> anyhow::Result<Vec<u32>> {
    if bytes.len() % 4 != 0 {
        bail!("token file length {} is not a multiple of 4", bytes.len());
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
        .collect())
}

fn real_main() -> anyhow::Result<()> {
    let mut path: Option<PathBuf> = None;
    let mut out: Option<PathBuf> = None;
    let mut flags = DumpFlags::empty();
    let mut binary = false;
    let mut options = TranslateOptions {
        max_tokens: DEFAULT_MAX_TOKENS,
        sanity_check: true,
    };

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print!("{}", usage());
                return Ok(());
            }
            "--verbose" => flags |= DumpFlags::VERBOSE,
            "--tokens" => binary = true,
            "--no-sanity" => options.sanity_check = false,
            "--out" => {
                let Some(v) = args.next() else {
                    bail!("--out requires a value");
                };
                out = Some(PathBuf::from(v));
            }
            "--max-tokens" => {
                let Some(v) = args.next() else {
                    bail!("--max-tokens requires a value");
                };
                options.max_tokens = parse_count("--max-tokens", &v)?;
            }
            _ if arg.starts_with("--max-tokens=") => {
                let v = &arg["--max-tokens=".len()..];
                options.max_tokens = parse_count("--max-tokens", v)?;
            }
            _ if arg.starts_with('-') => {
                bail!("unknown option {arg:?}\n\n{}", usage());
            }
            _ => {
                if path.is_some() {
                    bail!("unexpected positional argument {arg:?}\n\n{}", usage());
                }
                path = Some(PathBuf::from(arg));
            }
        }
    }

    let Some(path) = path else {
        bail!("missing input path\n\n{}", usage());
    };

    let tokens = if binary {
        let bytes = fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
        read_token_file(&bytes).with_context(|| format!("failed to load {}", path.display()))?
    } else {
        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        tgsi_text::translate(&text, &options)
            .with_context(|| format!("failed to translate {}", path.display()))?
    };

    let listing = tgsi::dump(&tokens, flags).context("failed to dump token stream")?;
    print!("{listing}");

    if let Some(out) = out {
        let bytes: Vec<u8> = tokens.iter().flat_map(|w| w.to_le_bytes()).collect();
        fs::write(&out, bytes).with_context(|| format!("failed to write {}", out.display()))?;
    }
    Ok(())
}
