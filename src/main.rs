use grimoire::assembler::assemble;
use grimoire::bytecode::CodeUnit;
use grimoire::config::Config;
use grimoire::disassembler::Disassembler;
use grimoire::host_headless::HeadlessEngine;
use grimoire::interpreter::Interpreter;
use grimoire::value::EntityHandle;
use log::{debug, info, warn};
use std::env;
use std::fs;
use std::path::Path;
use std::rc::Rc;

fn print_usage(program: &str) {
    println!("grimoire - script VM runner with a headless engine");
    println!();
    println!(
        "Usage: {} <script.grim|script.gasm> [--config cfg.toml] [--disasm] [--owner N] [--emit out.grim]",
        program
    );
    println!();
    println!("  --config   load VM limits and the headless world from a TOML file");
    println!("  --disasm   print the code unit listing before running");
    println!("  --owner    attach the script to entity N (default: global script)");
    println!("  --emit     write the loaded code unit as a .grim container");
}

fn program_name(args: &[String]) -> &str {
    args.first().map_or("grimoire", String::as_str)
}

struct Options {
    script_path: String,
    config_path: Option<String>,
    disasm: bool,
    owner: Option<EntityHandle>,
    emit: Option<String>,
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let mut options = Options {
        script_path: args[1].clone(),
        config_path: None,
        disasm: false,
        owner: None,
        emit: None,
    };
    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--disasm" => options.disasm = true,
            "--config" | "--owner" | "--emit" => {
                let value = args
                    .get(i + 1)
                    .ok_or_else(|| format!("{} needs a value", args[i]))?;
                match args[i].as_str() {
                    "--config" => options.config_path = Some(value.clone()),
                    "--emit" => options.emit = Some(value.clone()),
                    _ => {
                        let handle: u16 = value
                            .parse()
                            .map_err(|_| format!("Invalid owner handle: {}", value))?;
                        options.owner = Some(EntityHandle(handle));
                    }
                }
                i += 1;
            }
            other => return Err(format!("Unknown option: {}", other)),
        }
        i += 1;
    }
    Ok(options)
}

fn load_unit(path: &str) -> Result<CodeUnit, Box<dyn std::error::Error>> {
    let is_source = Path::new(path)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gasm"));
    if is_source {
        debug!("Assembling {}", path);
        let text = fs::read_to_string(path)?;
        Ok(assemble(&text)?)
    } else {
        debug!("Loading code unit {}", path);
        let bytes = fs::read(path)?;
        Ok(CodeUnit::from_bytes(&bytes)?)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let program = program_name(&args);

    // No script given: show help and exit successfully
    if args.len() < 2 {
        print_usage(program);
        return Ok(());
    }

    let options = match parse_args(&args) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("Error: {}", message);
            eprintln!();
            print_usage(program);
            std::process::exit(2);
        }
    };

    let config = match &options.config_path {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let unit = match load_unit(&options.script_path) {
        Ok(unit) => unit,
        Err(e) => {
            eprintln!("Error: cannot load '{}': {}", options.script_path, e);
            std::process::exit(1);
        }
    };

    if options.disasm {
        print!("{}", Disassembler::new(&unit));
    }
    if let Some(path) = &options.emit {
        fs::write(path, unit.to_bytes())?;
        info!("Wrote {}", path);
    }

    let tick_seconds = config.headless.tick_seconds;
    let max_ticks = config.headless.max_ticks;
    let engine = HeadlessEngine::new(config.headless.clone(), &config.world);
    let mut interp = Interpreter::new(engine, config.vm.clone());
    let id = interp.spawn(Rc::new(unit), options.owner);

    // Headless game loop: one slice per tick, then let simulated time pass
    let mut ticks = 0;
    interp.run(id);
    while !interp.all_finished() {
        if ticks >= max_ticks {
            warn!("Giving up after {} ticks", ticks);
            break;
        }
        interp.engine_mut().advance(tick_seconds);
        interp.tick();
        ticks += 1;
    }

    for line in interp.engine().output() {
        println!("{}", line);
    }
    if let Some(script) = interp.script(id) {
        println!("{}", script);
    }
    info!(
        "Finished after {} ticks, {} instructions",
        ticks,
        interp.instruction_count()
    );
    interp.shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_name_without_argv0() {
        assert_eq!(program_name(&[]), "grimoire");
        assert_eq!(program_name(&["./run".to_string()]), "./run");
    }

    #[test]
    fn test_parse_args() {
        let args: Vec<String> = ["grimoire", "a.gasm", "--owner", "3", "--disasm"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let options = parse_args(&args).unwrap();
        assert_eq!(options.owner, Some(EntityHandle(3)));
        assert!(options.disasm);
        assert!(parse_args(&args[..3]).is_err());
    }
}
