//! Line-oriented command interpreter.
//!
//! Each line holds one command and its whitespace-separated arguments. Empty
//! lines and lines starting with `#` are ignored.

use std::io::{BufRead, Write};

use anyhow::{Context as _, bail};
use dirfs::{FileSys, Process, SyscallError, storage::MemStore};

const READ_CHUNK: usize = 512;

pub struct Shell<'s, W> {
    fs: FileSys<'s, MemStore>,
    proc: Process<'s, MemStore>,
    out: W,
}

impl<'s, W> Shell<'s, W>
where
    W: Write,
{
    pub fn new(store: &'s MemStore, out: W) -> Self {
        Self {
            fs: FileSys::new(store),
            proc: Process::new(),
            out,
        }
    }

    /// Runs every command read from `input`.
    ///
    /// A failing command is reported on the output and does not stop the
    /// script. Returns the number of commands that failed.
    pub fn run<R>(&mut self, input: R) -> anyhow::Result<usize>
    where
        R: BufRead,
    {
        let mut failed = 0;
        for (lineno, line) in input.lines().enumerate() {
            let line = line.context("failed to read command")?;
            if let Err(e) = self.execute(&line) {
                failed += 1;
                writeln!(self.out, "error: line {}: {e:#}", lineno + 1)?;
            }
        }
        self.out.flush()?;
        Ok(failed)
    }

    pub fn execute(&mut self, line: &str) -> anyhow::Result<()> {
        let mut args = line.split_whitespace();
        let Some(cmd) = args.next() else {
            return Ok(());
        };
        if cmd.starts_with('#') {
            return Ok(());
        }
        tracing::debug!(line, "execute");

        match cmd {
            "mkdir" => {
                for path in args {
                    self.fs
                        .mkdir(&self.proc, path)
                        .with_context(|| format!("mkdir {path}"))?;
                }
            }
            "create" => {
                let path = required(&mut args, "path")?;
                let size = args
                    .next()
                    .map(str::parse)
                    .transpose()
                    .context("invalid size")?
                    .unwrap_or(0);
                self.fs
                    .create(&self.proc, path, size)
                    .with_context(|| format!("create {path}"))?;
            }
            "rm" => {
                for path in args {
                    self.fs
                        .remove(&self.proc, path)
                        .with_context(|| format!("rm {path}"))?;
                }
            }
            "cd" => {
                let path = args.next().unwrap_or("/");
                self.fs
                    .chdir(&mut self.proc, path)
                    .with_context(|| format!("cd {path}"))?;
            }
            "ls" => {
                let path = args.next().unwrap_or(".");
                let names = self.with_open(path, |fs, proc, fd| {
                    let mut names = vec![];
                    while let Some(name) = fs.readdir(proc, fd)? {
                        names.push(name);
                    }
                    Ok(names)
                })?;
                for name in names {
                    writeln!(self.out, "{name}")?;
                }
            }
            "write" => {
                let path = required(&mut args, "path")?;
                let text = args.collect::<Vec<_>>().join(" ");
                self.with_open(path, |fs, proc, fd| {
                    fs.write(proc, fd, text.as_bytes())?;
                    Ok(())
                })?;
            }
            "cat" => {
                let path = required(&mut args, "path")?;
                let data = self.with_open(path, |fs, proc, fd| {
                    let mut data = vec![];
                    let mut buf = [0; READ_CHUNK];
                    loop {
                        let n = fs.read(proc, fd, &mut buf)?;
                        if n == 0 {
                            break;
                        }
                        data.extend_from_slice(&buf[..n]);
                    }
                    Ok(data)
                })?;
                self.out.write_all(&data)?;
                writeln!(self.out)?;
            }
            "stat" => {
                let path = required(&mut args, "path")?;
                let (is_dir, inumber, size) = self.with_open(path, |fs, proc, fd| {
                    Ok((
                        fs.isdir(proc, fd)?,
                        fs.inumber(proc, fd)?,
                        fs.filesize(proc, fd)?,
                    ))
                })?;
                let kind = if is_dir { "directory" } else { "file" };
                writeln!(self.out, "{path}: {kind} inumber={inumber} size={size}")?;
            }
            _ => bail!("unknown command: {cmd}"),
        }
        Ok(())
    }

    /// Opens `path`, runs `f` on the descriptor and closes it again.
    fn with_open<T, F>(&mut self, path: &str, f: F) -> anyhow::Result<T>
    where
        F: FnOnce(
            &FileSys<'s, MemStore>,
            &mut Process<'s, MemStore>,
            usize,
        ) -> Result<T, SyscallError>,
    {
        let fd = self
            .fs
            .open(&mut self.proc, path)
            .with_context(|| format!("cannot open {path}"))?;
        let res = f(&self.fs, &mut self.proc, fd);
        self.fs.close(&mut self.proc, fd)?;
        res.with_context(|| path.to_owned())
    }
}

fn required<'a>(
    args: &mut impl Iterator<Item = &'a str>,
    what: &str,
) -> anyhow::Result<&'a str> {
    args.next().with_context(|| format!("missing {what}"))
}
