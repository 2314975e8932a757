use std::io::Read;
use std::path::Path;

use clap::Parser;

use sassbridge::{Args, CompileResult, Configuration, Errcode, Transpiler};

fn write_output(path: &Path, content: &str) -> Result<(), Errcode> {
    std::fs::write(path, content).map_err(|e| Errcode::OutputWrite(path.to_path_buf(), e))
}

fn run(args: &Args) -> Result<(), Errcode> {
    let config = Configuration::from_args(args)?;
    let transpiler = Transpiler::new(config)?;

    let result: CompileResult = match args.input_path() {
        Some(path) => transpiler.execute_file(path)?,
        None => {
            let mut src = String::new();
            std::io::stdin()
                .read_to_string(&mut src)
                .map_err(|e| Errcode::InputRead("-".into(), e))?;
            transpiler.execute(&src)?
        }
    };

    match args.output {
        Some(ref out) => write_output(out, &result.css)?,
        None => print!("{}", result.css),
    }

    if let (Some(file), Some(content)) = (&result.source_map_filename, &result.source_map_content)
    {
        write_output(Path::new(file), content)?;
        log::debug!("Wrote source map to {file}");
    }
    Ok(())
}

fn main() {
    let args = Args::parse();
    Configuration::init_logging(args.verbose);

    let tstart = std::time::Instant::now();
    if let Err(e) = run(&args) {
        log::error!("{e}");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
    log::debug!("Done in {:?}", tstart.elapsed());
}
