// Command-line front end for vcdecode.
//
// Subcommands decode a delta or print what is inside one (headers, or
// headers plus the instruction stream of every window).

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};
use log::LevelFilter;

use crate::io::{DeltaDecoder, Output, decode_file};
use crate::vcdiff::decoder::{DecodeOptions, HARD_MAX_WINSIZE, WindowDecoder};
use crate::vcdiff::header::{self, FileHeader, WindowHeader};
use crate::vcdiff::instruction::Instruction;
use crate::vcdiff::window::{Window, WindowSections};

const BUF_SIZE: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Byte size parsing (supports K, M, G suffixes)
// ---------------------------------------------------------------------------

fn parse_byte_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty size string".into());
    }
    let (num_part, multiplier) = match s.as_bytes().last() {
        Some(b'k' | b'K') => (&s[..s.len() - 1], 1024u64),
        Some(b'm' | b'M') => (&s[..s.len() - 1], 1024 * 1024),
        Some(b'g' | b'G') => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        _ => (s, 1u64),
    };
    let num: u64 = num_part
        .trim()
        .parse()
        .map_err(|e| format!("invalid size '{s}': {e}"))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| format!("size overflow: '{s}'"))
}

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// VCDIFF (RFC 3284) delta decoder.
#[derive(Parser, Debug)]
#[command(
    name = "vcdecode",
    version,
    about = "VCDIFF delta decoder",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Force overwrite existing output files.
    #[arg(short = 'f', long, global = true)]
    force: bool,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Output stats as JSON.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Decode a delta against a source.
    Decode(DecodeArgs),
    /// Print build/configuration details.
    Config,
    /// Print the file header and the first window header.
    Header(PrintArgs),
    /// Print the file header and every window header.
    Headers(PrintArgs),
    /// Print headers plus every window's instructions.
    Delta(PrintArgs),
}

#[derive(Args, Debug)]
struct DecodeArgs {
    /// Source file to copy from.
    #[arg(long, short = 's', value_hint = ValueHint::FilePath)]
    source: Option<PathBuf>,

    /// Input delta file (default: stdin).
    #[arg(long, value_hint = ValueHint::FilePath, conflicts_with = "input_pos")]
    input: Option<PathBuf>,

    /// Output file (default: stdout).
    #[arg(long, value_hint = ValueHint::FilePath, conflicts_with = "output_pos")]
    output: Option<PathBuf>,

    /// Write output to stdout.
    #[arg(short = 'c', long)]
    stdout: bool,

    /// Disable Adler-32 verification.
    #[arg(long = "no-checksum")]
    no_checksum: bool,

    /// Decode and verify only (do not write output).
    #[arg(long = "check-only")]
    no_output: bool,

    /// Largest target window accepted (supports K/M/G suffix).
    #[arg(long = "max-window-size", value_parser = parse_byte_size, default_value_t = HARD_MAX_WINSIZE)]
    max_window_size: u64,

    /// Input file (positional form).
    #[arg(value_hint = ValueHint::FilePath)]
    input_pos: Option<PathBuf>,

    /// Output file (positional form).
    #[arg(value_hint = ValueHint::FilePath)]
    output_pos: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct PrintArgs {
    /// VCDIFF input file.
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,
}

// ---------------------------------------------------------------------------
// Resolved command + options (flattened from Cli)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Decode,
    Config,
    PrintHdr,
    PrintHdrs,
    PrintDelta,
}

#[derive(Debug)]
struct Options {
    command: Command,
    use_stdout: bool,
    force: bool,
    quiet: bool,
    verbose: u8,
    no_output: bool,
    decode: DecodeOptions,
    source_file: Option<PathBuf>,
    input_file: Option<PathBuf>,
    output_file: Option<PathBuf>,
    json_output: bool,
}

fn resolve_options(cli: Cli) -> Options {
    let base = Options {
        command: Command::Config,
        use_stdout: false,
        force: cli.force,
        quiet: cli.quiet,
        verbose: cli.verbose.min(2),
        no_output: false,
        decode: DecodeOptions::default(),
        source_file: None,
        input_file: None,
        output_file: None,
        json_output: cli.json_output,
    };

    match cli.command {
        Cmd::Decode(args) => Options {
            command: Command::Decode,
            use_stdout: args.stdout,
            no_output: args.no_output,
            decode: DecodeOptions {
                verify_checksum: !args.no_checksum,
                max_window_size: args.max_window_size,
            },
            source_file: args.source,
            input_file: args.input.or(args.input_pos),
            output_file: args.output.or(args.output_pos),
            ..base
        },
        Cmd::Config => base,
        Cmd::Header(args) => Options {
            command: Command::PrintHdr,
            input_file: Some(args.input),
            ..base
        },
        Cmd::Headers(args) => Options {
            command: Command::PrintHdrs,
            input_file: Some(args.input),
            ..base
        },
        Cmd::Delta(args) => Options {
            command: Command::PrintDelta,
            input_file: Some(args.input),
            ..base
        },
    }
}

fn log_level(opts: &Options) -> LevelFilter {
    if opts.quiet {
        return LevelFilter::Error;
    }
    match opts.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    }
}

#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<String> = std::iter::once("vcdecode".to_string())
        .chain(args.iter().cloned())
        .collect();
    if let Ok(cli) = Cli::try_parse_from(argv) {
        let _ = resolve_options(cli);
    }
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("vcdecode: json: {e}"),
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// ---------------------------------------------------------------------------
// Config command
// ---------------------------------------------------------------------------

fn cmd_config(opts: &Options) -> i32 {
    let version = env!("CARGO_PKG_VERSION");
    let adler32 = cfg!(feature = "adler32");
    let file_io = cfg!(feature = "file-io");
    let ptr_size = std::mem::size_of::<*const ()>();

    if opts.json_output {
        print_json(&serde_json::json!({
            "version": version,
            "adler32_simd": adler32,
            "file_io": file_io,
            "hard_max_winsize": HARD_MAX_WINSIZE,
            "pointer_size": ptr_size,
        }));
        return 0;
    }

    println!("vcdecode version {version}");
    println!("ADLER32_SIMD={}", u8::from(adler32));
    println!("FILE_IO={}", u8::from(file_io));
    println!("HARD_MAX_WINSIZE={HARD_MAX_WINSIZE}");
    println!("sizeof(usize)={ptr_size}");
    0
}

// ---------------------------------------------------------------------------
// Decode command
// ---------------------------------------------------------------------------

fn cmd_decode(opts: &Options) -> i32 {
    let output_path = if opts.no_output || opts.use_stdout {
        None
    } else {
        opts.output_file.as_deref()
    };
    if let Some(path) = output_path
        && path.exists()
        && !opts.force
    {
        eprintln!(
            "vcdecode: output file exists, use -f to overwrite: {}",
            path.display()
        );
        return 1;
    }
    let output = if opts.no_output {
        Output::Discard
    } else {
        output_path.map_or(Output::Stdout, Output::Path)
    };

    match &opts.input_file {
        Some(delta_path) => decode_from_file(opts, delta_path, output),
        None => decode_from_stdin(opts, output),
    }
}

fn decode_from_file(opts: &Options, delta_path: &Path, output: Output<'_>) -> i32 {
    let stats = match decode_file(opts.source_file.as_deref(), delta_path, output, opts.decode) {
        Ok(stats) => stats,
        Err(e) => {
            eprintln!("vcdecode: {}: {e}", delta_path.display());
            return 1;
        }
    };

    log::info!(
        "decoded {} bytes in {} windows from a {} byte delta",
        stats.output_size,
        stats.windows,
        stats.delta_size
    );
    if opts.json_output {
        let sha = stats.output_sha256.map(|d| hex(&d));
        let json = serde_json::json!({
            "command": "decode",
            "source_size": stats.source_size,
            "delta_size": stats.delta_size,
            "output_size": stats.output_size,
            "windows": stats.windows,
            "output_sha256": sha,
        });
        match serde_json::to_string_pretty(&json) {
            Ok(s) => eprintln!("{s}"),
            Err(e) => eprintln!("vcdecode: json: {e}"),
        }
    }
    0
}

fn decode_from_stdin(opts: &Options, output: Output<'_>) -> i32 {
    let source = match &opts.source_file {
        Some(path) => match std::fs::read(path) {
            Ok(data) => data,
            Err(e) => {
                eprintln!("vcdecode: source file: {}: {e}", path.display());
                return 1;
            }
        },
        None => Vec::new(),
    };

    let sink: Box<dyn Write> = match output {
        Output::Discard => Box::new(io::sink()),
        Output::Stdout => Box::new(io::stdout().lock()),
        Output::Path(path) => match File::create(path) {
            Ok(f) => Box::new(f),
            Err(e) => {
                eprintln!("vcdecode: output file: {}: {e}", path.display());
                return 1;
            }
        },
    };
    let mut writer = BufWriter::with_capacity(BUF_SIZE, sink);
    let mut decoder = DeltaDecoder::with_options(BufReader::new(io::stdin()), opts.decode);

    let total = match decoder.decode_to(&source, &mut writer) {
        Ok(total) => total,
        Err(e) => {
            eprintln!("vcdecode: decode error: {e}");
            return 1;
        }
    };
    if let Err(e) = writer.flush() {
        eprintln!("vcdecode: write flush error: {e}");
        return 1;
    }

    log::info!(
        "decoded {total} bytes in {} windows",
        decoder.windows_decoded()
    );
    if opts.json_output {
        let json = serde_json::json!({
            "command": "decode",
            "source_size": source.len(),
            "output_size": total,
            "windows": decoder.windows_decoded(),
        });
        match serde_json::to_string_pretty(&json) {
            Ok(s) => eprintln!("{s}"),
            Err(e) => eprintln!("vcdecode: json: {e}"),
        }
    }
    0
}

// ---------------------------------------------------------------------------
// Print commands (header, headers, delta)
// ---------------------------------------------------------------------------

/// Reader that counts consumed bytes, for reporting header sizes.
struct Counting<R> {
    inner: R,
    count: u64,
}

impl<R: Read> Read for Counting<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count += n as u64;
        Ok(n)
    }
}

fn flag_names(names: impl Iterator<Item = &'static str>) -> String {
    let names: Vec<&str> = names.map(vcd_name).collect();
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(" ")
    }
}

fn file_header_flags(hdr: &FileHeader) -> String {
    flag_names(hdr.indicator.iter_names().map(|(name, _)| name))
}

fn window_flags(wh: &WindowHeader) -> String {
    flag_names(wh.indicator.iter_names().map(|(name, _)| name))
}

fn delta_flags(wh: &WindowHeader) -> String {
    flag_names(wh.delta_indicator.iter_names().map(|(name, _)| name))
}

fn vcd_name(flag: &str) -> &'static str {
    match flag {
        "SECONDARY" => "VCD_SECONDARY",
        "CODETABLE" => "VCD_CODETABLE",
        "APPHEADER" => "VCD_APPHEADER",
        "SOURCE" => "VCD_SOURCE",
        "TARGET" => "VCD_TARGET",
        "ADLER32" => "VCD_ADLER32",
        "DATACOMP" => "VCD_DATACOMP",
        "INSTCOMP" => "VCD_INSTCOMP",
        "ADDRCOMP" => "VCD_ADDRCOMP",
        _ => "VCD_UNKNOWN",
    }
}

fn cmd_print(opts: &Options) -> i32 {
    let Some(input_file) = &opts.input_file else {
        eprintln!("vcdecode: print commands require an input file");
        return 1;
    };
    let file = match File::open(input_file) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("vcdecode: {}: {e}", input_file.display());
            return 1;
        }
    };
    let mut reader = Counting {
        inner: BufReader::with_capacity(BUF_SIZE, file),
        count: 0,
    };

    let file_hdr = match FileHeader::decode(&mut reader) {
        Ok(hdr) => hdr,
        Err(e) => {
            eprintln!("vcdecode: invalid VCDIFF header: {e}");
            return 1;
        }
    };
    let hdr_size = reader.count;
    let json = opts.json_output;
    let mut json_windows = Vec::new();

    if !json {
        println!("VCDIFF version:               0");
        println!("VCDIFF header size:           {hdr_size}");
        println!("VCDIFF header indicator:      {}", file_header_flags(&file_hdr));
        if let Some(id) = file_hdr.secondary_id {
            println!("VCDIFF secondary compressor:  id={id}");
        }
        if let Some(ct) = &file_hdr.code_table {
            println!(
                "VCDIFF code table:            near={} same={}",
                ct.near_size, ct.same_size
            );
        }
        if let Some(data) = &file_hdr.app_header
            && !data.is_empty()
        {
            println!(
                "VCDIFF application header:    {}",
                String::from_utf8_lossy(data)
            );
        }
    }

    let engine = WindowDecoder::for_header(&file_hdr);
    let (mut data_buf, mut inst_buf, mut addr_buf) = (Vec::new(), Vec::new(), Vec::new());
    let mut window_num: u64 = 0;
    let mut target_offset: u64 = 0;

    loop {
        let wh = match WindowHeader::decode(&mut reader) {
            Ok(Some(wh)) => wh,
            Ok(None) => break,
            Err(e) => {
                eprintln!("vcdecode: window {window_num}: {e}");
                return 1;
            }
        };
        let sections = header::read_payload(&mut reader, wh.data_len, &mut data_buf)
            .and_then(|()| header::read_payload(&mut reader, wh.inst_len, &mut inst_buf))
            .and_then(|()| header::read_payload(&mut reader, wh.addr_len, &mut addr_buf));
        if let Err(e) = sections {
            eprintln!("vcdecode: window {window_num} sections: {e}");
            return 1;
        }

        let listing = if opts.command == Command::PrintDelta {
            if !wh.delta_indicator.is_empty() {
                eprintln!("vcdecode: window {window_num}: secondary compression is not supported");
                return 1;
            }
            let window = Window::new(
                wh.descriptor(target_offset),
                WindowSections {
                    data: &data_buf,
                    inst: &inst_buf,
                    addr: &addr_buf,
                },
            );
            match list_instructions(&engine, window) {
                Ok(listing) => Some(listing),
                Err(e) => {
                    eprintln!("vcdecode: window {window_num}: {e}");
                    return 1;
                }
            }
        } else {
            None
        };

        if json {
            let mut entry = serde_json::json!({
                "window": window_num,
                "indicator": window_flags(&wh),
                "target_offset": target_offset,
                "copy_window_length": wh.copy_window_len,
                "copy_window_offset": wh.copy_window_offset,
                "delta_encoding_length": wh.enc_len,
                "target_window_length": wh.target_window_len,
                "delta_indicator": delta_flags(&wh),
                "data_length": wh.data_len,
                "inst_length": wh.inst_len,
                "addr_length": wh.addr_len,
                "adler32": wh.adler32,
            });
            if let Some(listing) = &listing {
                entry["instructions"] = listing
                    .iter()
                    .map(|l| {
                        serde_json::json!({
                            "offset": l.offset,
                            "instruction": l.inst.to_string(),
                            "location": l.location(),
                        })
                    })
                    .collect();
            }
            json_windows.push(entry);
        } else {
            print_window_header(window_num, target_offset, &wh);
            if let Some(listing) = &listing {
                println!("  Offset Instruction");
                for l in listing {
                    match l.location() {
                        Some(loc) => println!("  {:06} {} {loc}", l.offset, l.inst),
                        None => println!("  {:06} {}", l.offset, l.inst),
                    }
                }
            }
        }

        target_offset = target_offset.saturating_add(wh.target_window_len);
        window_num += 1;
        if opts.command == Command::PrintHdr {
            break;
        }
    }

    if json {
        print_json(&serde_json::json!({
            "header_size": hdr_size,
            "header_indicator": file_header_flags(&file_hdr),
            "secondary_id": file_hdr.secondary_id,
            "custom_code_table": file_hdr.code_table.is_some(),
            "app_header_size": file_hdr.app_header_size(),
            "windows": json_windows,
        }));
    }
    0
}

fn print_window_header(window_num: u64, target_offset: u64, wh: &WindowHeader) {
    if window_num > 0 {
        println!();
    }
    println!("VCDIFF window number:         {window_num}");
    println!("VCDIFF window indicator:      {}", window_flags(wh));
    if let Some(cksum) = wh.adler32 {
        println!("VCDIFF adler32 checksum:      {cksum:08X}");
    }
    if !wh.delta_indicator.is_empty() {
        println!("VCDIFF delta indicator:       {}", delta_flags(wh));
    }
    if target_offset > 0 {
        println!("VCDIFF window at offset:      {target_offset}");
    }
    if wh.has_copy_segment() {
        println!("VCDIFF copy window length:    {}", wh.copy_window_len);
        println!("VCDIFF copy window offset:    {}", wh.copy_window_offset);
    }
    println!("VCDIFF delta encoding length: {}", wh.enc_len);
    println!("VCDIFF target window length:  {}", wh.target_window_len);
    println!("VCDIFF data section length:   {}", wh.data_len);
    println!("VCDIFF inst section length:   {}", wh.inst_len);
    println!("VCDIFF addr section length:   {}", wh.addr_len);
}

/// One decoded instruction of the `delta` listing.
struct Listed {
    /// Absolute output offset the instruction writes at.
    offset: u64,
    inst: Instruction,
    /// For COPY: the region (S = source, T = target) and absolute
    /// position it reads from. `None` when the position does not fit u64.
    source: Option<(char, u64)>,
}

impl Listed {
    fn location(&self) -> Option<String> {
        self.source.map(|(tag, pos)| format!("{tag}@{pos}"))
    }
}

/// Decode a window's instructions without executing them.
fn list_instructions(
    engine: &WindowDecoder,
    window: Window<'_>,
) -> Result<Vec<Listed>, crate::vcdiff::error::WindowError> {
    let d = window.descriptor;
    let mut offset = d.target_window_offset;
    let mut listed = Vec::new();
    for inst in engine.instructions(window) {
        let inst = inst?;
        let source = match inst {
            Instruction::Copy { address, .. } if address < d.source_segment_length => {
                let tag = if d.source_is_target { 'T' } else { 'S' };
                d.source_segment_offset.checked_add(address).map(|pos| (tag, pos))
            }
            Instruction::Copy { address, .. } => d
                .target_window_offset
                .checked_add(address - d.source_segment_length)
                .map(|pos| ('T', pos)),
            _ => None,
        };
        listed.push(Listed {
            offset,
            inst,
            source,
        });
        offset = offset.saturating_add(inst.size() as u64);
    }
    Ok(listed)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run() -> ! {
    let cli = Cli::parse();
    let mut opts = resolve_options(cli);

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_level(&opts).as_str()),
    )
    .format_timestamp(None)
    .format_target(false)
    .init();

    if opts.use_stdout
        && let Some(path) = opts.output_file.take()
    {
        log::warn!("-c option overrides output filename: {}", path.display());
    }

    let exit_code = match opts.command {
        Command::Decode => cmd_decode(&opts),
        Command::Config => cmd_config(&opts),
        Command::PrintHdr | Command::PrintHdrs | Command::PrintDelta => cmd_print(&opts),
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
