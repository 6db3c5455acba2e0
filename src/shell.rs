use std::io::{self, BufRead, Write};
use std::ops::ControlFlow;

use clap::ValueEnum;
use tracing::error;

use crate::dataset::Dataset;
use crate::evaluation::Evaluator;
use crate::mlp::ModelFactory;
use crate::plot::PlotRenderer;
use crate::presenter::Presenter;
use crate::procedure::Procedure;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Evaluate(Procedure),
    Quit,
}

impl Command {
    pub fn label(self) -> &'static str {
        match self {
            Command::Evaluate(procedure) => procedure.label(),
            Command::Quit => "Quit",
        }
    }
}

/// One menu entry: the key a user types and what it triggers.
#[derive(Debug, Clone, Copy)]
pub struct Trigger {
    pub key: &'static str,
    pub command: Command,
}

pub const TRIGGERS: [Trigger; 5] = [
    Trigger {
        key: "1",
        command: Command::Evaluate(Procedure::TrainTest),
    },
    Trigger {
        key: "2",
        command: Command::Evaluate(Procedure::FiveFold),
    },
    Trigger {
        key: "3",
        command: Command::Evaluate(Procedure::TenFold),
    },
    Trigger {
        key: "4",
        command: Command::Evaluate(Procedure::RandomSplits),
    },
    Trigger {
        key: "q",
        command: Command::Quit,
    },
];

/// Maps a menu key, a trigger label or a procedure name to its command.
pub fn resolve(input: &str) -> Option<Command> {
    let input = input.trim();

    TRIGGERS
        .iter()
        .find(|trigger| {
            trigger.key.eq_ignore_ascii_case(input)
                || trigger.command.label().eq_ignore_ascii_case(input)
        })
        .map(|trigger| trigger.command)
        .or_else(|| Procedure::from_str(input, true).ok().map(Command::Evaluate))
}

pub fn write_menu<W: Write>(mut output: W) -> io::Result<()> {
    writeln!(output, "MLP Classifier Evaluation")?;
    for trigger in &TRIGGERS {
        writeln!(output, "  [{}] {}", trigger.key, trigger.command.label())?;
    }
    Ok(())
}

/// Blocking menu loop: each command runs to completion before the next
/// line is read.
pub struct Shell<'a, F, P> {
    evaluator: &'a Evaluator<F>,
    dataset: &'a Dataset,
    presenter: P,
    renderer: &'a dyn PlotRenderer,
}

impl<'a, F: ModelFactory, P: Presenter> Shell<'a, F, P> {
    pub fn new(
        evaluator: &'a Evaluator<F>,
        dataset: &'a Dataset,
        presenter: P,
        renderer: &'a dyn PlotRenderer,
    ) -> Self {
        Self {
            evaluator,
            dataset,
            presenter,
            renderer,
        }
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    /// Runs one command. A failed evaluation is reported and the shell
    /// stays usable.
    pub fn dispatch(&mut self, command: Command) -> ControlFlow<()> {
        let Command::Evaluate(procedure) = command else {
            return ControlFlow::Break(());
        };

        if let Err(err) = self
            .evaluator
            .run(procedure, self.dataset, &mut self.presenter, self.renderer)
        {
            error!(%procedure, error = %err, "evaluation aborted");
            self.presenter
                .show_message("Error", &format!("{procedure} failed: {err}"));
        }

        ControlFlow::Continue(())
    }

    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut output: W) -> io::Result<()> {
        write_menu(&mut output)?;
        prompt(&mut output)?;

        for line in input.lines() {
            let line = line?;
            if !line.trim().is_empty() {
                match resolve(&line) {
                    Some(command) => {
                        if self.dispatch(command).is_break() {
                            break;
                        }
                    }
                    None => writeln!(output, "unknown choice {:?}", line.trim())?,
                }
            }
            prompt(&mut output)?;
        }

        Ok(())
    }
}

fn prompt<W: Write>(output: &mut W) -> io::Result<()> {
    write!(output, "> ")?;
    output.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::testing::{benign_malignant, ConstantFactory, IndexFactory, NoopRenderer};
    use crate::evaluation::EvaluationSettings;
    use crate::presenter::testing::RecordingPresenter;

    #[test]
    fn every_procedure_has_exactly_one_trigger() {
        for procedure in Procedure::ALL {
            let count = TRIGGERS
                .iter()
                .filter(|t| t.command == Command::Evaluate(procedure))
                .count();
            assert_eq!(count, 1, "{procedure}");
        }
        assert_eq!(resolve("q"), Some(Command::Quit));
    }

    #[test]
    fn resolves_keys_labels_and_names() {
        assert_eq!(resolve(" 2 "), Some(Command::Evaluate(Procedure::FiveFold)));
        assert_eq!(
            resolve("random splits (66-34)"),
            Some(Command::Evaluate(Procedure::RandomSplits))
        );
        assert_eq!(
            resolve("ten-fold"),
            Some(Command::Evaluate(Procedure::TenFold))
        );
        assert_eq!(resolve("QUIT"), Some(Command::Quit));
        assert_eq!(resolve("7"), None);
    }

    #[test]
    fn runs_commands_until_quit() {
        let dataset = benign_malignant(20);
        let evaluator = Evaluator::new(ConstantFactory("benign"), EvaluationSettings::default());
        let mut shell = Shell::new(&evaluator, &dataset, RecordingPresenter::default(), &NoopRenderer);
        let mut output = Vec::new();

        shell
            .run("1\nbogus\n\nq\n4\n".as_bytes(), &mut output)
            .unwrap();

        let titles: Vec<String> = shell
            .presenter()
            .messages()
            .into_iter()
            .map(|(title, _)| title)
            .collect();
        assert_eq!(titles, ["Training Results"]);
        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("[4] Random Splits (66-34)"));
        assert!(output.contains("unknown choice \"bogus\""));
    }

    #[test]
    fn failed_evaluation_is_reported_and_the_shell_continues() {
        let dataset = benign_malignant(20);
        let evaluator = Evaluator::new(IndexFactory::new(0), EvaluationSettings::default());
        let mut shell = Shell::new(&evaluator, &dataset, RecordingPresenter::default(), &NoopRenderer);

        assert!(shell
            .dispatch(Command::Evaluate(Procedure::TrainTest))
            .is_continue());
        assert!(shell.dispatch(Command::Quit).is_break());

        let messages = shell.presenter().messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, "Error");
        assert!(messages[0].1.starts_with("Train and Test (Same Data) failed"));
    }
}
