use std::ffi::OsString;

use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand};

use crate::Program;

#[derive(Debug, Parser)]
#[command(name = "apicall")]
#[command(about = "Call REST and JSON-RPC APIs on the first reachable endpoint", long_about = None)]
pub struct ApicallCli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage default headers and basic authentication
    Auth {
        #[command(subcommand)]
        command: Option<AuthCommand>,
    },
    /// Show the endpoint list, or replace it with the given URLs
    Endpoint { urls: Vec<String> },
    /// Send a REST request
    Rest(RestArgs),
    /// Send a JSON-RPC request
    Jsonrpc(JsonrpcArgs),
}

#[derive(Debug, Subcommand)]
pub enum AuthCommand {
    /// Show or edit the headers sent with every request
    Header {
        #[command(subcommand)]
        command: Option<HeaderCommand>,
    },
    /// Show or edit the basic authentication credential
    Basic {
        #[command(subcommand)]
        command: Option<BasicCommand>,
    },
}

#[derive(Debug, Subcommand)]
pub enum HeaderCommand {
    /// Add a header, replacing any header with the same name
    Set { name: String, value: String },
    /// Remove headers by name
    Unset {
        #[arg(required = true)]
        names: Vec<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum BasicCommand {
    /// Store a user and password
    Set { user: String, password: String },
    /// Forget the stored credential
    Unset,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Args)]
pub struct RestArgs {
    #[arg(short = 'R', long, help = "Print the response body unchanged")]
    pub raw: bool,
    #[arg(short, long, action = ArgAction::Count, help = "Print the request and response headers")]
    pub verbose: u8,
    #[arg(short = 'H', long = "header", value_name = "NAME: VALUE")]
    pub headers: Vec<String>,
    #[arg(long, value_name = "MIME")]
    pub accept: Option<String>,
    #[arg(long = "content-type", visible_alias = "type", value_name = "MIME")]
    pub content_type: Option<String>,
    #[arg(short, long, value_name = "DATA|@FILE", help = "Request body, or @FILE to read it from a file")]
    pub data: Option<String>,
    pub method: String,
    pub url: String,
    #[arg(value_name = "QUERY", help = "Query parameters as KEY=VALUE")]
    pub queries: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Args)]
pub struct JsonrpcArgs {
    #[arg(long, help = "Print the response body unchanged")]
    pub raw: bool,
    #[arg(long, action = ArgAction::Count, help = "Print the request and response headers")]
    pub verbose: u8,
    #[arg(short = 'H', long = "header", value_name = "NAME: VALUE")]
    pub headers: Vec<String>,
    #[arg(long, value_name = "MIME")]
    pub accept: Option<String>,
    #[arg(long = "content-type", visible_alias = "type", value_name = "MIME")]
    pub content_type: Option<String>,
    pub method: String,
    #[arg(value_name = "ARG", allow_hyphen_values = true, help = "Positional parameters, parsed as JSON when possible")]
    pub args: Vec<String>,
}

#[derive(Debug, Parser)]
#[command(name = "restcall")]
#[command(about = "Send a REST request to the first reachable endpoint", long_about = None)]
pub struct RestcallCli {
    #[command(flatten)]
    pub args: RestArgs,
}

#[derive(Debug, Parser)]
#[command(name = "jsonrpccall")]
#[command(about = "Send a JSON-RPC request to the first reachable endpoint", long_about = None)]
pub struct JsonrpccallCli {
    #[command(flatten)]
    pub args: JsonrpcArgs,
}

/// A parsed command line, in the grammar of the program that was invoked.
#[derive(Debug)]
pub enum Invocation {
    Apicall(ApicallCli),
    Restcall(RestArgs),
    Jsonrpccall(JsonrpcArgs),
}

/// Parse `args` (including the program name) with the grammar of `program`.
pub fn parse<I, T>(program: Program, args: I) -> Result<Invocation, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    Ok(match program {
        Program::Apicall => Invocation::Apicall(ApicallCli::try_parse_from(args)?),
        Program::Restcall => Invocation::Restcall(RestcallCli::try_parse_from(args)?.args),
        Program::Jsonrpccall => {
            Invocation::Jsonrpccall(JsonrpccallCli::try_parse_from(args)?.args)
        }
    })
}

/// Help text of the `apicall` subcommand at `path`, e.g. `["auth"]`.
pub fn usage(path: &[&str]) -> String {
    let mut command = ApicallCli::command();
    command.build();
    for name in path {
        command = match command.find_subcommand(name) {
            Some(sub) => sub.clone(),
            None => break,
        };
    }
    command.render_help().to_string()
}
