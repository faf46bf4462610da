use ilpatch::batch::Batch;
use ilpatch::il::model::Module;
use ilpatch::il::{describe_method, Error};

use clap::{value_parser, Arg, ArgMatches, Command};
use std::fs;
use std::path::PathBuf;

fn main() -> Result<(), Error> {
    env_logger::init();

    let matches = Command::new("IL module patcher")
        .version(clap::crate_version!())
        .about("Apply structural patches to the method bodies of an IL module")
        .subcommand_required(true)
        .subcommand(
            Command::new("apply")
                .about("Run a patch plan against a module and write the result")
                .arg(
                    Arg::new("plan")
                        .long("plan")
                        .value_name("PLAN_FILE")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Patch plan, one operation per line"),
                )
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .value_name("OUTPUT")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Where to write the patched module"),
                )
                .arg(
                    Arg::new("INPUT")
                        .help("Module file to patch")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .index(1),
                ),
        )
        .subcommand(
            Command::new("dump")
                .about("Print methods of a module")
                .arg(
                    Arg::new("type")
                        .long("type")
                        .value_name("TYPE_NAME")
                        .help("Only methods of this type (eg. `Game.PlayerStats`)"),
                )
                .arg(
                    Arg::new("method")
                        .long("method")
                        .value_name("METHOD_NAME")
                        .requires("type")
                        .help("Only methods with this name"),
                )
                .arg(
                    Arg::new("INPUT")
                        .help("Module file to read")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .index(1),
                ),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("apply", matches)) => apply(matches),
        Some(("dump", matches)) => dump(matches),
        _ => unreachable!("a subcommand is required"),
    }
}

fn path_arg<'a>(matches: &'a ArgMatches, name: &str) -> &'a PathBuf {
    matches
        .get_one::<PathBuf>(name)
        .expect("required arguments are enforced by clap")
}

fn apply(matches: &ArgMatches) -> Result<(), Error> {
    let input = path_arg(matches, "INPUT");
    let plan = path_arg(matches, "plan");
    let output = path_arg(matches, "output");

    log::info!("Reading plan '{}'", plan.display());
    let batch = Batch::from_plan(&fs::read_to_string(plan)?)?;

    log::info!("Reading module '{}'", input.display());
    let mut module = Module::open(input)?;
    let report = batch.run(&mut module)?;
    log::info!(
        "Applied {} patches, skipped {}",
        report.applied.len(),
        report.skipped.len()
    );
    for (name, err) in &report.skipped {
        log::warn!("Skipped {}: {:?}", name, err);
    }

    module.write_to_path(output, true)?;
    Ok(())
}

fn dump(matches: &ArgMatches) -> Result<(), Error> {
    let module = Module::open(path_arg(matches, "INPUT"))?;

    let methods = match matches.get_one::<String>("type") {
        None => module.method_ids().collect(),
        Some(type_name) => {
            let type_id = module.require_type(type_name)?;
            match matches.get_one::<String>("method") {
                None => module.type_def(type_id).methods.clone(),
                Some(method_name) => module.find_methods(type_id, method_name),
            }
        }
    };
    if methods.is_empty() {
        log::warn!("No methods matched");
    }
    for method in methods {
        println!("{}", describe_method(&module, method));
    }
    Ok(())
}
