//! The `ddb` command line, assembled from the kernel's registries.

use std::collections::{BTreeMap, BTreeSet};

use clap::{Arg, ArgAction, ArgMatches, Args};
use ddb_lib::command::{Command, Phase, PhaseArgument};
use ddb_lib::consts::APP_NAME;
use ddb_lib::kernel::Kernel;
use ddb_lib::registry::Registry;

/// Flags accepted by every subcommand.
#[derive(Args, Debug, Default, Clone)]
pub struct Globals {
  /// Raise the log level (-v debug, -vv trace)
  #[arg(short, long, action = ArgAction::Count, global = true)]
  pub verbose: u8,

  /// Log everything, same as -vv
  #[arg(long, global = true)]
  pub very_verbose: bool,

  /// Only log errors
  #[arg(short, long, global = true, conflicts_with_all = ["verbose", "very_verbose"])]
  pub silent: bool,

  /// Empty every cache before running
  #[arg(short, long, global = true)]
  pub clear_cache: bool,

  /// Keep running and react to file changes
  #[arg(short, long, global = true)]
  pub watch: bool,

  /// Stop at the first failing action
  #[arg(long, global = true)]
  pub fail_fast: bool,

  /// Print version information
  #[arg(long)]
  pub version: bool,
}

impl Globals {
  /// Read global flags straight from the raw arguments.
  ///
  /// Scanning stops at `--` and once a second positional word is seen, since
  /// anything after it may be a trailing argument such as `ddb run npm -v`.
  pub fn scan(args: &[String]) -> Self {
    let mut globals = Self::default();
    let mut positionals = 0;
    for arg in args.iter().skip(1) {
      if arg == "--" || positionals > 1 {
        break;
      }
      match arg.as_str() {
        "--verbose" => globals.verbose = globals.verbose.saturating_add(1),
        "--very-verbose" => globals.very_verbose = true,
        "--silent" => globals.silent = true,
        "--clear-cache" => globals.clear_cache = true,
        "--watch" => globals.watch = true,
        "--fail-fast" => globals.fail_fast = true,
        "--version" => globals.version = true,
        long if long.starts_with("--") => {}
        short if short.starts_with('-') && short.len() > 1 => {
          for flag in short.chars().skip(1) {
            match flag {
              'v' => globals.verbose = globals.verbose.saturating_add(1),
              's' => globals.silent = true,
              'c' => globals.clear_cache = true,
              'w' => globals.watch = true,
              _ => {}
            }
          }
        }
        _ => positionals += 1,
      }
    }
    globals
  }

  pub fn verbosity(&self) -> u8 {
    if self.very_verbose { 2 } else { self.verbose }
  }
}

/// Build the command tree from the registered commands and the arguments
/// their phases contribute.
pub fn command(kernel: &Kernel) -> clap::Command {
  let app = clap::Command::new(APP_NAME)
    .about("Automates the configuration of containerized developer environments")
    .disable_version_flag(true);
  let mut app = Globals::augment_args(app);

  let commands = kernel.commands();
  let phases = kernel.phases();
  for command in commands.iter().filter(|c| c.parent.is_none()) {
    app = app.subcommand(subcommand(command, &commands, &phases));
  }
  app
}

fn subcommand(command: &Command, commands: &Registry<Command>, phases: &Registry<Phase>) -> clap::Command {
  let mut sub = clap::Command::new(command.name.clone()).about(command.description.clone());
  for argument in phase_arguments(command, phases) {
    sub = sub.arg(to_arg(argument));
  }
  for child in commands.iter().filter(|c| c.parent.as_deref() == Some(command.name.as_str())) {
    sub = sub.subcommand(subcommand(child, commands, phases));
  }
  sub
}

/// Arguments of every phase of `command`, first declaration wins.
fn phase_arguments<'a>(command: &Command, phases: &'a Registry<Phase>) -> Vec<&'a PhaseArgument> {
  let mut seen = BTreeSet::new();
  command
    .phases
    .iter()
    .filter_map(|name| phases.get(name).ok())
    .flat_map(|phase| phase.arguments.iter())
    .filter(|argument| seen.insert(argument.name.clone()))
    .collect()
}

fn to_arg(argument: &PhaseArgument) -> Arg {
  let arg = Arg::new(argument.name.clone()).help(argument.help.clone());
  if argument.trailing {
    arg
      .num_args(0..)
      .trailing_var_arg(true)
      .allow_hyphen_values(true)
      .action(ArgAction::Append)
  } else if argument.positional {
    arg.required(argument.required).action(ArgAction::Set)
  } else {
    arg.long(argument.name.clone()).action(ArgAction::SetTrue)
  }
}

/// The innermost subcommand that was invoked, with its matches.
pub fn invoked(matches: &ArgMatches) -> Option<(String, &ArgMatches)> {
  let (mut name, mut current) = matches.subcommand()?;
  while let Some((child, child_matches)) = current.subcommand() {
    name = child;
    current = child_matches;
  }
  Some((name.to_string(), current))
}

/// Values of the phase arguments of `command`; flags read as `"true"` or
/// `"false"`.
pub fn arguments(kernel: &Kernel, command: &str, matches: &ArgMatches) -> BTreeMap<String, Vec<String>> {
  let commands = kernel.commands();
  let phases = kernel.phases();
  let Ok(command) = commands.get(command) else {
    return BTreeMap::new();
  };

  phase_arguments(command, &phases)
    .into_iter()
    .map(|argument| {
      let values = if argument.positional {
        matches
          .get_many::<String>(&argument.name)
          .map(|values| values.cloned().collect())
          .unwrap_or_default()
      } else {
        vec![matches.get_flag(&argument.name).to_string()]
      };
      (argument.name.clone(), values)
    })
    .collect()
}
