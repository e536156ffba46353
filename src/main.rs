use macchiato::classfile::ClassFile;
use macchiato::runtime::Runtime;

use std::env;
use std::fs;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        println!("Usage: {} <class_file_path> <method_name>", args[0]);
        return ExitCode::SUCCESS;
    }
    run(&args[1], &args[2])
}

fn run(path: &str, method_name: &str) -> ExitCode {
    let class_data = match fs::read(path) {
        Ok(data) => data,
        Err(err) => {
            eprintln!("Failed to read '{path}': {err}");
            return ExitCode::FAILURE;
        }
    };

    let class = match ClassFile::parse(&class_data) {
        Ok(class) => class,
        Err(err) => {
            eprintln!("Failed to load class file '{path}': {err}");
            return ExitCode::FAILURE;
        }
    };

    let Some(method) = class.find_method(method_name) else {
        let class_name = class.class_name(class.this_class).unwrap_or("<unknown>");
        eprintln!("Method '{method_name}' does not exist in class '{class_name}'");
        return ExitCode::SUCCESS;
    };

    // Execution failures are reported but do not change the exit code.
    if let Err(err) = Runtime::new(&class).execute_method(method) {
        eprintln!("Execution of method '{method_name}' failed: {err}");
    }
    ExitCode::SUCCESS
}
