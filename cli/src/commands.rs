use std::fs;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context as _};
use apicall_core::{
    ApiError, Dispatcher, Headers, Params, Renderer, RpcClient, RpcRequest, StreamRenderer, Target,
};
use serde_json::Value;
use tracing::warn;

use crate::args::{
    usage, AuthCommand, BasicCommand, Command, HeaderCommand, Invocation, JsonrpcArgs, RestArgs,
};
use crate::config::{self, Config};
use crate::exit;
use crate::Console;

const CONNECTION_ERROR: &str =
    "ERROR: Could not connect to server.\nPlease check endpoint urls and HTTP server status.";

/// Everything a command needs: the loaded configuration, where to save it,
/// and the streams to write to.
pub struct Context<'a> {
    pub config: Config,
    pub config_path: PathBuf,
    pub console: &'a mut Console,
}

impl Context<'_> {
    fn print(&mut self, text: &str) -> u8 {
        match writeln!(self.console.out, "{text}") {
            Ok(()) => exit::OK,
            Err(err) => {
                warn!(error = %err, "failed to write output");
                exit::RENDER_FAILURE
            }
        }
    }

    fn error(&mut self, text: &str) {
        if let Err(err) = writeln!(self.console.err, "{text}") {
            warn!(error = %err, "failed to write error output");
        }
    }

    fn save(&mut self) -> u8 {
        match config::save(&self.config_path, &self.config) {
            Ok(()) => exit::OK,
            Err(err) => {
                self.error(&format!("ERROR: {err:#}"));
                exit::FAILED_TO_INIT
            }
        }
    }

    fn render(&mut self, raw: bool, bytes: &[u8]) -> Result<(), ApiError> {
        let passthrough = raw || !self.console.out_is_terminal;
        StreamRenderer::new(&mut self.console.out, &mut self.console.err)
            .passthrough(passthrough)
            .render_bytes(bytes)
    }

    /// Report `err` the way its class asks for and return its exit code.
    fn fail(&mut self, raw: bool, err: ApiError) -> u8 {
        let rendered = match &err {
            ApiError::Connectivity { .. } => {
                self.error(CONNECTION_ERROR);
                Ok(())
            }
            ApiError::InvalidResponse { reason, raw: body } => {
                warn!(reason = %reason, "invalid response");
                self.render(raw, body)
            }
            ApiError::ErrorResponse { response, .. } => match serde_json::to_vec(response) {
                Ok(document) => self.render(raw, &document),
                Err(source) => Err(ApiError::Serialization(source)),
            },
            other => {
                self.error(&format!("ERROR: {other}"));
                Ok(())
            }
        };
        if let Err(render_err) = rendered {
            self.error(&format!("ERROR: {render_err}"));
        }
        exit::for_error(&err)
    }
}

pub fn execute(invocation: Invocation, ctx: &mut Context) -> u8 {
    match invocation {
        Invocation::Apicall(cli) => match cli.command {
            None => print_usage(ctx, &[]),
            Some(Command::Auth { command: None }) => print_usage(ctx, &["auth"]),
            Some(Command::Auth {
                command: Some(AuthCommand::Header { command }),
            }) => auth_header(ctx, command),
            Some(Command::Auth {
                command: Some(AuthCommand::Basic { command }),
            }) => auth_basic(ctx, command),
            Some(Command::Endpoint { urls }) => endpoint(ctx, urls),
            Some(Command::Rest(args)) => rest(ctx, &args),
            Some(Command::Jsonrpc(args)) => jsonrpc(ctx, &args),
        },
        Invocation::Restcall(args) => rest(ctx, &args),
        Invocation::Jsonrpccall(args) => jsonrpc(ctx, &args),
    }
}

fn print_usage(ctx: &mut Context, path: &[&str]) -> u8 {
    match ctx.console.out.write_all(usage(path).as_bytes()) {
        Ok(()) => exit::INVALID_ARGS,
        Err(_) => exit::RENDER_FAILURE,
    }
}

fn auth_header(ctx: &mut Context, command: Option<HeaderCommand>) -> u8 {
    match command {
        None => {
            let rows: Vec<(&str, &str)> = ctx
                .config
                .headers
                .iter()
                .map(|h| (h.name.as_str(), h.value.as_str()))
                .collect();
            let table = table(("NAME", "VALUE"), &rows);
            ctx.print(&table)
        }
        Some(HeaderCommand::Set { name, value }) => {
            ctx.config.add_header(&name, &value);
            ctx.save()
        }
        Some(HeaderCommand::Unset { names }) => {
            ctx.config.remove_headers(names.as_slice());
            ctx.save()
        }
    }
}

fn auth_basic(ctx: &mut Context, command: Option<BasicCommand>) -> u8 {
    match command {
        None => match &ctx.config.basic {
            None => ctx.print("Basic authentication is not configured."),
            Some(basic) => {
                let text = format!("User: {}\nPassword: {}", basic.user, basic.password);
                ctx.print(&text)
            }
        },
        Some(BasicCommand::Set { user, password }) => {
            ctx.config.basic = Some(apicall_core::BasicAuth::new(user, password));
            ctx.save()
        }
        Some(BasicCommand::Unset) => {
            ctx.config.basic = None;
            ctx.save()
        }
    }
}

fn endpoint(ctx: &mut Context, urls: Vec<String>) -> u8 {
    if urls.is_empty() {
        let list = ctx.config.endpoints.join("\n");
        return ctx.print(&list);
    }
    ctx.config.endpoints = urls;
    ctx.save()
}

fn rest(ctx: &mut Context, args: &RestArgs) -> u8 {
    let prepared = read_data(args.data.as_deref()).and_then(|body| {
        let mut headers = ctx.config.headers.clone();
        headers.merge(&cli_headers(
            &args.headers,
            args.accept.as_deref(),
            args.content_type.as_deref(),
        )?);
        Ok((body, headers))
    });
    let (body, headers) = match prepared {
        Ok(prepared) => prepared,
        Err(err) => {
            ctx.error(&format!("ERROR: {err:#}"));
            return exit::INVALID_ARGS;
        }
    };

    let mut target = Target::new(&args.method, args.url.as_str())
        .with_queries(args.queries.iter().cloned())
        .with_headers(headers)
        .with_credential(ctx.config.basic.clone());
    if let Some(body) = body {
        target = target.with_body(body);
    }

    let endpoints = ctx.config.endpoints.clone();
    let fetched = Dispatcher::new().fetch(
        &endpoints,
        &target,
        args.verbose,
        Some(ctx.console.out.as_mut()),
    );
    match fetched {
        Ok(response) => match ctx.render(args.raw, &response.body) {
            Ok(()) => exit::OK,
            Err(err) => ctx.fail(args.raw, err),
        },
        Err(err) => ctx.fail(args.raw, err),
    }
}

fn jsonrpc(ctx: &mut Context, args: &JsonrpcArgs) -> u8 {
    let mut headers = ctx.config.headers.clone();
    match cli_headers(&args.headers, args.accept.as_deref(), args.content_type.as_deref()) {
        Ok(extra) => headers.merge(&extra),
        Err(err) => {
            ctx.error(&format!("ERROR: {err:#}"));
            return exit::INVALID_ARGS;
        }
    }

    let params = Params::Positional(args.args.iter().map(|arg| parse_param(arg)).collect());
    let request = RpcRequest::new(args.method.as_str(), params);
    let client = RpcClient::new(ctx.config.endpoints.clone(), headers, ctx.config.basic.clone());

    match client.send(&request, args.verbose, Some(ctx.console.out.as_mut())) {
        Ok(raw) => match ctx.render(args.raw, &raw) {
            Ok(()) => exit::OK,
            Err(err) => ctx.fail(args.raw, err),
        },
        Err(err) => ctx.fail(args.raw, err),
    }
}

/// `DATA` as UTF-8 bytes, or the contents of `FILE` for `@FILE`.
fn read_data(data: Option<&str>) -> anyhow::Result<Option<Vec<u8>>> {
    match data {
        None => Ok(None),
        Some(data) => match data.strip_prefix('@') {
            Some(path) => fs::read(path)
                .with_context(|| format!("failed to read request body from {path}"))
                .map(Some),
            None => Ok(Some(data.as_bytes().to_vec())),
        },
    }
}

/// Split `Name: value` at the first colon.
fn parse_header(raw: &str) -> anyhow::Result<(&str, &str)> {
    match raw.split_once(':') {
        Some((name, value)) if !name.trim().is_empty() => Ok((name.trim_end(), value.trim_start())),
        _ => bail!("invalid header {raw:?}, expected \"Name: value\""),
    }
}

fn cli_headers(
    raw: &[String],
    accept: Option<&str>,
    content_type: Option<&str>,
) -> anyhow::Result<Headers> {
    let mut headers = Headers::new();
    for header in raw {
        let (name, value) = parse_header(header)?;
        headers.insert(name, value);
    }
    if let Some(accept) = accept {
        headers.insert("accept", accept);
    }
    if let Some(content_type) = content_type {
        headers.insert("content-type", content_type);
    }
    Ok(headers)
}

fn parse_param(arg: &str) -> Value {
    serde_json::from_str(arg).unwrap_or_else(|_| Value::String(arg.to_string()))
}

/// Two-column table with a dashed rule under the titles.
fn table(titles: (&str, &str), rows: &[(&str, &str)]) -> String {
    let name_width = rows
        .iter()
        .map(|(name, _)| name.chars().count())
        .chain([titles.0.chars().count()])
        .max()
        .unwrap_or(0);
    let value_width = rows
        .iter()
        .map(|(_, value)| value.chars().count())
        .chain([titles.1.chars().count()])
        .max()
        .unwrap_or(0);

    let mut lines = vec![
        format!("{:<name_width$}  {}", titles.0, titles.1),
        format!("{}  {}", "-".repeat(name_width), "-".repeat(value_width)),
    ];
    for (name, value) in rows {
        lines.push(format!("{name:<name_width$}  {value}"));
    }
    lines.join("\n")
}
