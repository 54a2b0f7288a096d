//! @ai:module:intent Test names, batch file naming and JSONL batch file I/O
//! @ai:module:layer application
//! @ai:module:public_api test_name, validate_test_name, Postfix, batch_file_path, write_batch_file, read_batch_file, render_batch
//! @ai:module:stateless true

use crate::batch::provider::{BatchCodec, LineOptions, ParsedLine};
use crate::batch::types::{validate_items, BatchItem, RetrievedBatch};
use crate::error::{Error, Result};
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};

/// @ai:intent Stage of a two-round batch run, appended to the test name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Postfix {
    Upload1,
    Upload2,
    Download1,
    Download2,
}

impl Postfix {
    pub fn as_str(&self) -> &'static str {
        match self {
            Postfix::Upload1 => "_upload1",
            Postfix::Upload2 => "_upload2",
            Postfix::Download1 => "_download1",
            Postfix::Download2 => "_download2",
        }
    }

    /// @ai:intent Download postfix paired with an upload postfix
    /// @ai:effects pure
    pub fn download_for(upload: Postfix) -> Postfix {
        match upload {
            Postfix::Upload1 | Postfix::Download1 => Postfix::Download1,
            Postfix::Upload2 | Postfix::Download2 => Postfix::Download2,
        }
    }
}

/// @ai:intent Reject names that are unsafe as file names
/// @ai:effects pure
pub fn validate_test_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains([' ', ':', ';']) {
        return Err(Error::InvalidTestName(name.to_string()));
    }
    Ok(())
}

/// @ai:intent Build `<test>_<model>_<YYYY-MM-DD>at<HH.MM.SS>`
/// @ai:pre test contains no space, ':' or ';'
/// @ai:effects pure
pub fn test_name(test: &str, model: &str, at: NaiveDateTime) -> Result<String> {
    validate_test_name(test)?;
    let name = format!("{}_{}_{}", test, model, at.format("%Y-%m-%dat%H.%M.%S"));
    validate_test_name(&name)?;
    Ok(name)
}

/// @ai:intent `<dir>/<testname><postfix>.jsonl`
/// @ai:effects pure
pub fn batch_file_path(dir: &Path, testname: &str, postfix: Postfix) -> PathBuf {
    dir.join(format!("{}{}.jsonl", testname, postfix.as_str()))
}

/// @ai:intent Serialize validated items as newline-terminated JSONL
/// @ai:post one line per item, in input order
/// @ai:effects pure
pub fn render_batch(
    codec: &dyn BatchCodec,
    options: &LineOptions,
    items: &[BatchItem],
) -> Result<String> {
    validate_items(items)?;

    let mut out = String::new();
    for item in items {
        out.push_str(&codec.serialize_line(item, options)?);
        out.push('\n');
    }
    Ok(out)
}

/// @ai:intent Validate and write a batch upload file
/// @ai:pre testname is valid; items have unique identifiers and supported shapes
/// @ai:post nothing is written when validation fails
/// @ai:effects fs:write
pub fn write_batch_file(
    dir: &Path,
    testname: &str,
    postfix: Postfix,
    codec: &dyn BatchCodec,
    options: &LineOptions,
    items: &[BatchItem],
) -> Result<PathBuf> {
    validate_test_name(testname)?;
    let content = render_batch(codec, options, items)?;

    std::fs::create_dir_all(dir)?;
    let path = batch_file_path(dir, testname, postfix);
    std::fs::write(&path, content)?;
    Ok(path)
}

fn read_lines(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| Error::FileRead {
        path: path.to_path_buf(),
        source,
    })
}

/// @ai:intent Read back the items of an upload file
/// @ai:effects fs:read
pub fn read_batch_file(path: &Path, codec: &dyn BatchCodec) -> Result<Vec<BatchItem>> {
    read_lines(path)?
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| codec.parse_request_line(line))
        .collect()
}

/// @ai:intent Parse raw result JSONL into responses with summed usage
/// @ai:effects pure
pub fn parse_results(codec: &dyn BatchCodec, content: &str) -> Result<RetrievedBatch> {
    let mut batch = RetrievedBatch::default();

    for (idx, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let ParsedLine {
            response,
            echoed_request,
        } = codec.parse_result_line(idx + 1, line)?;

        batch.usage += response.usage;
        batch.items.push(response);
        batch.echoed_requests.extend(echoed_request);
    }

    Ok(batch)
}

/// @ai:intent Parse a downloaded result file
/// @ai:effects fs:read
pub fn read_results_file(path: &Path, codec: &dyn BatchCodec) -> Result<RetrievedBatch> {
    parse_results(codec, &read_lines(path)?)
}
