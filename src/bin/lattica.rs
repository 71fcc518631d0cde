// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use lattica::{
    config::LatticaConfig,
    dataset::{DataNode, Dataset, FieldValue},
    lattice::{Clinical, DataSpace, Frequency},
    path::default_config_path,
    store::{DataStore, XnatStore},
};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use inquire::Password;
use std::{collections::BTreeMap, fs::read_to_string, path::PathBuf, process::exit};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "lattica [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<()> {
        match self.command {
            Command::Frequencies => run_frequencies(),
            Command::Nodes(opts) => run_nodes(self.config, opts),
            Command::Items(opts) => run_items(self.config, opts),
            Command::Get(opts) => run_get(self.config, opts),
            Command::Put(opts) => run_put(self.config, opts),
            Command::Checksums(opts) => run_checksums(self.config, opts),
            Command::GetField(opts) => run_get_field(self.config, opts),
            Command::PutField(opts) => run_put_field(self.config, opts),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// List frequencies of the clinical data space.
    #[command(override_usage = "lattica frequencies")]
    Frequencies,

    /// List data nodes of a project.
    #[command(override_usage = "lattica nodes [options] <project>")]
    Nodes(NodesOptions),

    /// List file groups and fields of a data node.
    #[command(override_usage = "lattica items <project> <frequency> [<id>...]")]
    Items(NodeOptions),

    /// Fetch file group into the local cache.
    #[command(override_usage = "lattica get [options] <project> <frequency> [<id>...] --path <path> --format <format>")]
    Get(FileGroupOptions),

    /// Replace file group in the store with local files.
    #[command(override_usage = "lattica put [options] <project> <frequency> [<id>...] --path <path> --format <format> --primary <file>")]
    Put(PutOptions),

    /// Show remote checksums of a file group.
    #[command(override_usage = "lattica checksums [options] <project> <frequency> [<id>...] --path <path> --format <format>")]
    Checksums(FileGroupOptions),

    /// Read field of a data node.
    #[command(override_usage = "lattica get-field <project> <frequency> [<id>...] --path <path>")]
    GetField(FieldOptions),

    /// Write field of a data node.
    #[command(override_usage = "lattica put-field <project> <frequency> [<id>...] --path <path> <value>")]
    PutField(PutFieldOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct NodesOptions {
    /// Project to list nodes of.
    #[arg(required = true, value_name = "project")]
    pub project: String,

    /// Only list nodes of this frequency.
    #[arg(short, long, value_name = "frequency")]
    pub frequency: Option<Frequency<Clinical>>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct NodeOptions {
    /// Project holding the node.
    #[arg(required = true, value_name = "project")]
    pub project: String,

    /// Frequency of the node.
    #[arg(required = true, value_name = "frequency")]
    pub frequency: Frequency<Clinical>,

    /// Labels of the node, one per axis for aggregate frequencies. Omit for
    /// dataset-wide nodes.
    #[arg(value_name = "id")]
    pub id: Vec<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct FileGroupOptions {
    #[command(flatten)]
    pub node: NodeOptions,

    /// Path of the file group within the node.
    #[arg(short, long, required = true, value_name = "path")]
    pub path: String,

    /// Name of the file format.
    #[arg(short = 't', long, required = true, value_name = "format")]
    pub format: String,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct PutOptions {
    #[command(flatten)]
    pub file_group: FileGroupOptions,

    /// Primary file, or directory for directory formats.
    #[arg(long, required = true, value_name = "file")]
    pub primary: PathBuf,

    /// Side car as name=path pair.
    #[arg(short, long, value_name = "name=path", value_parser = parse_aux)]
    pub aux: Vec<(String, PathBuf)>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct FieldOptions {
    #[command(flatten)]
    pub node: NodeOptions,

    /// Path of the field within the node.
    #[arg(short, long, required = true, value_name = "path")]
    pub path: String,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct PutFieldOptions {
    #[command(flatten)]
    pub field: FieldOptions,

    /// Value literal, e.g., 42, "text", or [1,2,3].
    #[arg(required = true, value_name = "value", allow_hyphen_values = true)]
    pub value: String,
}

fn parse_aux(arg: &str) -> Result<(String, PathBuf), String> {
    arg.split_once('=')
        .map(|(name, path)| (name.to_string(), PathBuf::from(path)))
        .ok_or_else(|| format!("expected name=path, found {arg:?}"))
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run() -> Result<()> {
    Cli::parse().run()
}

fn load_config(path: Option<PathBuf>) -> Result<LatticaConfig> {
    let path = match path {
        Some(path) => path,
        None => default_config_path()?,
    };
    let data = read_to_string(&path).with_context(|| format!("failed to read configuration {}", path.display()))?;
    let mut config: LatticaConfig = data.parse()?;

    // INVARIANT: Ask for the password only when a user is configured.
    if let (Some(user), true) = (config.store.user.clone(), config.store.password.is_none()) {
        let password = Password::new(&format!("Password of {user} on {}:", config.store.server))
            .without_confirmation()
            .prompt()?;
        config.store.password = Some(password);
    }

    Ok(config)
}

fn open(config: Option<PathBuf>) -> Result<(LatticaConfig, XnatStore)> {
    let config = load_config(config)?;
    let store = XnatStore::from_settings(&config.store)?;
    Ok((config, store))
}

fn populate(store: &XnatStore, project: &str) -> Result<Dataset> {
    let mut dataset = store.dataset(project, None)?;
    store.find_nodes(&mut dataset)?;
    Ok(dataset)
}

/// Look up node in populated tree, registering aggregate nodes on demand.
fn locate<'a>(store: &XnatStore, dataset: &'a mut Dataset, opts: &NodeOptions) -> Result<&'a mut DataNode> {
    let id = dataset.node_id(opts.frequency, opts.id.clone())?;
    let native = store.default_hierarchy().contains(&opts.frequency);
    let node = if native {
        dataset
            .node_mut(opts.frequency, &id)
            .ok_or_else(|| anyhow!("no {} node {:?} in {}", opts.frequency, id.to_string(), opts.project))?
    } else {
        dataset.insert_node(opts.frequency, id)
    };
    store.find_items(node)?;

    Ok(node)
}

fn run_frequencies() -> Result<()> {
    for (name, bits) in Clinical::MEMBERS {
        let frequency = Frequency::<Clinical>::new(*bits)?;
        let basis = frequency
            .nonzero_basis()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" + ");
        println!("{name:<13} {bits:#05b}  {basis}");
    }

    Ok(())
}

fn run_nodes(config: Option<PathBuf>, opts: NodesOptions) -> Result<()> {
    let (_, store) = open(config)?;
    let dataset = populate(&store, &opts.project)?;
    for node in dataset.all_nodes() {
        if opts.frequency.is_some_and(|frequency| frequency != node.frequency()) {
            continue;
        }
        println!("{}", node.address());
    }

    Ok(())
}

fn run_items(config: Option<PathBuf>, opts: NodeOptions) -> Result<()> {
    let (_, store) = open(config)?;
    let mut dataset = populate(&store, &opts.project)?;
    let node = locate(&store, &mut dataset, &opts)?;

    for file_group in node.file_groups() {
        let resources = file_group.uris().keys().cloned().collect::<Vec<_>>().join(", ");
        println!("{}  [{resources}]", file_group.path());
    }
    for field in node.fields() {
        let value = field.value().map(ToString::to_string).unwrap_or_default();
        println!("{} = {value}", field.path());
    }

    Ok(())
}

fn run_get(config: Option<PathBuf>, opts: FileGroupOptions) -> Result<()> {
    let (config, store) = open(config)?;
    let format = config
        .format(&opts.format)
        .ok_or_else(|| anyhow!("unknown format {:?}", opts.format))?;
    let mut dataset = populate(&store, &opts.node.project)?;
    let node = locate(&store, &mut dataset, &opts.node)?;

    let mut file_group = match node.file_group(&opts.path) {
        Some(file_group) => file_group.clone(),
        None => node.new_file_group(&opts.path),
    };
    file_group.set_datatype(format);
    let files = store.get_file_group(&mut file_group)?;

    println!("{}", files.primary.display());
    for (name, path) in files.aux {
        println!("{name}: {}", path.display());
    }

    Ok(())
}

fn run_put(config: Option<PathBuf>, opts: PutOptions) -> Result<()> {
    let (config, store) = open(config)?;
    let format = config
        .format(&opts.file_group.format)
        .ok_or_else(|| anyhow!("unknown format {:?}", opts.file_group.format))?;
    let mut dataset = populate(&store, &opts.file_group.node.project)?;
    let node = locate(&store, &mut dataset, &opts.file_group.node)?;

    let mut file_group = node.new_file_group(&opts.file_group.path);
    file_group.set_datatype(format);
    let aux: BTreeMap<String, PathBuf> = opts.aux.into_iter().collect();
    store.put_file_group(&mut file_group, &opts.primary, &aux)?;
    info!("stored {file_group}");

    Ok(())
}

fn run_checksums(config: Option<PathBuf>, opts: FileGroupOptions) -> Result<()> {
    let (config, store) = open(config)?;
    let format = config
        .format(&opts.format)
        .ok_or_else(|| anyhow!("unknown format {:?}", opts.format))?;
    let mut dataset = populate(&store, &opts.node.project)?;
    let node = locate(&store, &mut dataset, &opts.node)?;

    let mut file_group = node
        .file_group(&opts.path)
        .cloned()
        .ok_or_else(|| anyhow!("no file group {:?} in {}", opts.path, node.address()))?;
    file_group.set_datatype(format);
    for (key, digest) in store.get_checksums(&file_group)?.iter() {
        println!("{digest}  {key}");
    }

    Ok(())
}

fn run_get_field(config: Option<PathBuf>, opts: FieldOptions) -> Result<()> {
    let (_, store) = open(config)?;
    let mut dataset = populate(&store, &opts.node.project)?;
    let node = locate(&store, &mut dataset, &opts.node)?;

    let field = node
        .field(&opts.path)
        .ok_or_else(|| anyhow!("no field {:?} in {}", opts.path, node.address()))?;
    println!("{}", store.get_field(field)?);

    Ok(())
}

fn run_put_field(config: Option<PathBuf>, opts: PutFieldOptions) -> Result<()> {
    let (_, store) = open(config)?;
    let mut dataset = populate(&store, &opts.field.node.project)?;
    let node = locate(&store, &mut dataset, &opts.field.node)?;

    let value = FieldValue::parse(&opts.value);
    let field = match node.field(&opts.field.path) {
        Some(field) => field.clone(),
        None => node.add_field(&opts.field.path, None).clone(),
    };
    store.put_field(&field, &value)?;

    Ok(())
}
