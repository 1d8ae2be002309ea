//! Ordered accumulation of one ffmpeg invocation.

use std::path::Path;

use ef_codec::{Arg, EncodingProfile};
use ef_core::{Error, Result};
use ef_probe::StreamAnalysis;

use crate::filter::FilterGraph;
use crate::quote::join_args;
use crate::synthesizer::CommandSynthesizer;

/// Collects arguments by section and emits them in a fixed order:
/// global options, input options, `-i input`, filters, output options,
/// output path.
///
/// Simple per-output filters go to `-vf`; a labelled graph goes to
/// `-filter_complex`. A command may carry one or the other.
#[derive(Debug, Clone, Default)]
pub struct CommandBuilder {
    global_options: Vec<String>,
    input_options: Vec<String>,
    input: Option<String>,
    filters: Vec<String>,
    complex_filter: Option<String>,
    output_options: Vec<String>,
    output: Option<String>,
}

impl CommandBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the full command for `profile` applied to `input`.
    pub fn from_profile(
        input: &Path,
        output: &Path,
        profile: &EncodingProfile,
        analysis: &StreamAnalysis,
    ) -> Result<String> {
        CommandSynthesizer::default().synthesize(input, output, profile, analysis)
    }

    pub fn global_option(&mut self, option: impl Into<String>) -> &mut Self {
        self.global_options.push(option.into());
        self
    }

    pub fn input_args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.input_options.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn input(&mut self, path: impl Into<String>) -> &mut Self {
        self.input = Some(path.into());
        self
    }

    /// Append one expression to the `-vf` chain.
    pub fn filter(&mut self, expr: impl Into<String>) -> &mut Self {
        self.filters.push(expr.into());
        self
    }

    pub fn complex_filter(&mut self, graph: &FilterGraph) -> &mut Self {
        self.complex_filter = Some(graph.to_string());
        self
    }

    pub fn output_arg(&mut self, arg: &Arg) -> &mut Self {
        arg.extend_into(&mut self.output_options);
        self
    }

    pub fn output_args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_options.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn output(&mut self, path: impl Into<String>) -> &mut Self {
        self.output = Some(path.into());
        self
    }

    /// The argument vector, without the program name.
    pub fn build_args(&self) -> Result<Vec<String>> {
        let input = self
            .input
            .as_ref()
            .ok_or_else(|| Error::Validation("command has no input path".into()))?;
        let output = self
            .output
            .as_ref()
            .ok_or_else(|| Error::Validation("command has no output path".into()))?;
        if !self.filters.is_empty() && self.complex_filter.is_some() {
            return Err(Error::Validation(
                "command cannot combine -vf with -filter_complex".into(),
            ));
        }

        let mut args = self.global_options.clone();
        args.extend(self.input_options.iter().cloned());
        args.push("-i".into());
        args.push(input.clone());
        if let Some(ref graph) = self.complex_filter {
            args.push("-filter_complex".into());
            args.push(graph.clone());
        } else if !self.filters.is_empty() {
            args.push("-vf".into());
            args.push(self.filters.join(","));
        }
        args.extend(self.output_options.iter().cloned());
        args.push(output.clone());
        Ok(args)
    }

    /// The flat, quoted command string.
    pub fn build(&self) -> Result<String> {
        Ok(join_args(&self.build_args()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn fixed_section_order() {
        let mut b = CommandBuilder::new();
        // Added out of order on purpose.
        b.output("/out/o.mp4")
            .output_arg(&Arg::new("-c:v", "libx264"))
            .filter("scale=1280:720")
            .input("/in/i.mkv")
            .input_args(["-hwaccel", "cuda"])
            .global_option("-y");
        assert_eq!(
            b.build().unwrap(),
            "-y -hwaccel cuda -i /in/i.mkv -vf scale=1280:720 -c:v libx264 /out/o.mp4"
        );
    }

    #[test]
    fn missing_paths_fail() {
        let mut b = CommandBuilder::new();
        b.output("o.mp4");
        assert_matches!(b.build(), Err(Error::Validation(m)) if m.contains("input"));

        let mut b = CommandBuilder::new();
        b.input("i.mkv");
        assert_matches!(b.build(), Err(Error::Validation(m)) if m.contains("output"));
    }

    #[test]
    fn complex_filter_excludes_vf() {
        let mut graph = FilterGraph::new();
        graph.split("0:v", 2);
        let mut b = CommandBuilder::new();
        b.input("i").output("o").complex_filter(&graph);
        assert_eq!(b.build().unwrap(), "-i i -filter_complex [0:v]split=2[s0][s1] o");

        b.filter("null");
        assert_matches!(b.build(), Err(Error::Validation(_)));
    }

    #[test]
    fn paths_with_spaces_are_quoted() {
        let mut b = CommandBuilder::new();
        b.input("/in/My Film.mkv").output("/out/My Film.mp4");
        assert_eq!(b.build().unwrap(), "-i \"/in/My Film.mkv\" \"/out/My Film.mp4\"");
    }
}
