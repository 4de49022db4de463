use crate::acquisition_params;
use crate::cli::ConfigArgs;
use crate::exit_codes;

pub fn execute(args: ConfigArgs) -> i32 {
    let config = match acquisition_params::build_config(&args.acquisition) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return exit_codes::INPUT_ERROR;
        }
    };

    let json = if args.compact {
        serde_json::to_string(&config)
    } else {
        serde_json::to_string_pretty(&config)
    };
    let json = match json {
        Ok(j) => j,
        Err(e) => {
            eprintln!("Error serializing configuration: {}", e);
            return exit_codes::EXECUTION_ERROR;
        }
    };

    let written = match args.output.as_deref() {
        Some(path) => std::fs::write(path, format!("{}\n", json))
            .map_err(|e| format!("Failed to write '{}': {}", path, e)),
        None => {
            println!("{}", json);
            Ok(())
        }
    };

    match written {
        Ok(()) => exit_codes::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            exit_codes::EXECUTION_ERROR
        }
    }
}
