use std::io::{BufRead, Write};

use anyhow::{bail, Result};
use tracing::warn;

use crate::{
    block_height::{local_midnight_timestamp, parse_cutoff_date, BlockHeightLookup},
    units::Wei,
};

#[derive(Debug, PartialEq)]
pub struct RunInputs {
    pub start_block: u64,
    pub max_balance: Wei,
    pub max_wallets: usize,
}

/// Asks the operator for the run inputs, repeating each question until the
/// answer is valid.
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub async fn ask_run_inputs(&mut self, lookup: &impl BlockHeightLookup) -> Result<RunInputs> {
        let start_block = self.ask_start_block(lookup).await?;
        let max_balance = self.ask_max_balance()?;
        let max_wallets = self.ask_max_wallets()?;

        Ok(RunInputs {
            start_block,
            max_balance,
            max_wallets,
        })
    }

    fn ask(&mut self, question: &str) -> Result<String> {
        write!(self.output, "{}", question)?;
        self.output.flush()?;

        let mut answer = String::new();
        if self.input.read_line(&mut answer)? == 0 {
            bail!("input closed while waiting for an answer to {:?}", question.trim());
        }

        Ok(answer.trim().to_string())
    }

    fn tell(&mut self, message: &str) -> Result<()> {
        writeln!(self.output, "{}", message)?;
        Ok(())
    }

    /// Resolves a `DD/MM/YYYY` date to the block height at local midnight.
    pub async fn ask_start_block(&mut self, lookup: &impl BlockHeightLookup) -> Result<u64> {
        loop {
            let answer = self.ask("Scan wallets active before which date? (DD/MM/YYYY): ")?;

            let date = match parse_cutoff_date(&answer) {
                Ok(date) => date,
                Err(err) => {
                    self.tell(&format!("{}, try again", err))?;
                    continue;
                }
            };

            let timestamp = local_midnight_timestamp(date)?;

            match lookup.block_height_at(timestamp).await {
                Ok(Some(height)) => return Ok(height),
                Ok(None) => {
                    self.tell(&format!("no block found for {}, try another date", answer))?;
                }
                Err(err) => {
                    warn!(timestamp, "block height lookup failed: {}", err);
                    self.tell(&format!("could not look up a block for {}, try again", answer))?;
                }
            }
        }
    }

    pub fn ask_max_balance(&mut self) -> Result<Wei> {
        loop {
            let answer = self.ask("Maximum wallet balance in ETH: ")?;

            match Wei::from_ether_str(&answer) {
                Ok(balance) if balance > Wei::ZERO => return Ok(balance),
                Ok(_) => self.tell("the balance ceiling has to be above zero")?,
                Err(err) => self.tell(&format!("{}, try again", err))?,
            }
        }
    }

    pub fn ask_max_wallets(&mut self) -> Result<usize> {
        loop {
            let answer = self.ask("Number of wallets to collect: ")?;

            match answer.parse::<usize>() {
                Ok(count) => return Ok(count),
                Err(_) => self.tell(&format!("{:?} is not a whole number, try again", answer))?,
            }
        }
    }
}
