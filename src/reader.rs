use std::io::BufRead;

use bstr::ByteSlice;

use crate::dataset::{SparseInstance, StringInstance};
use crate::error::{Error, Result};
use crate::feature::{SparseFeatureVector, StringFeatureVector};

fn parse_error(line: usize, message: impl Into<String>) -> Error {
    Error::Parse {
        line,
        message: message.into(),
    }
}

/// Line source shared by both readers: yields trimmed, non-blank lines with
/// their 1-based line numbers
#[derive(Debug)]
struct Lines<R> {
    reader: R,
    buf: Vec<u8>,
    line: usize,
}

impl<R: BufRead> Lines<R> {
    fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            line: 0,
        }
    }

    /// Advance to the next non-blank line, or `None` at end of input
    fn advance(&mut self) -> Option<Result<usize>> {
        loop {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {
                    self.line += 1;
                    if !self.buf.trim().is_empty() {
                        return Some(Ok(self.line));
                    }
                }
                Err(err) => return Some(Err(err.into())),
            }
        }
    }

    /// Split the current line into a label and its feature tokens
    fn split(&self) -> Result<(&str, Vec<&str>)> {
        let mut fields = self.buf.trim().fields();
        let label = match fields.next() {
            Some(label) => label,
            None => return Err(parse_error(self.line, "missing label")),
        };
        let label = label
            .to_str()
            .map_err(|_| parse_error(self.line, "label is not valid UTF-8"))?;
        let tokens = fields
            .map(|token| {
                token
                    .to_str()
                    .map_err(|_| parse_error(self.line, "feature is not valid UTF-8"))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok((label, tokens))
    }
}

/// Reads [`StringInstance`]s, one per line
///
/// ```text
/// label type:value type:value ...
/// label type:value:weight type:value:weight ...
/// ```
#[derive(Debug)]
pub struct InstanceReader<R> {
    lines: Lines<R>,
}

impl<R: BufRead> InstanceReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: Lines::new(reader),
        }
    }

    fn parse_line(&self) -> Result<StringInstance> {
        let line = self.lines.line;
        let (label, tokens) = self.lines.split()?;
        let mut features: Option<StringFeatureVector> = None;
        for token in tokens {
            let (ftype, value, weight) = parse_feature(token).map_err(|m| parse_error(line, m))?;
            let x = features.get_or_insert_with(|| {
                if weight.is_some() {
                    StringFeatureVector::weighted()
                } else {
                    StringFeatureVector::new()
                }
            });
            match (x.has_weight(), weight) {
                (true, Some(weight)) => x.add_weighted_feature(ftype, value, weight),
                (false, None) => x.add_feature(ftype, value),
                (true, None) => {
                    return Err(parse_error(line, format!("missing weight in '{}'", token)))
                }
                (false, Some(_)) => {
                    return Err(parse_error(
                        line,
                        format!("unexpected weight in '{}'", token),
                    ))
                }
            }
        }
        Ok(StringInstance::new(label, features.unwrap_or_default()))
    }
}

/// Split `type:value[:weight]`
fn parse_feature(token: &str) -> std::result::Result<(u32, &str, Option<f64>), String> {
    let bytes = token.as_bytes();
    let first = bytes
        .find_byte(b':')
        .ok_or_else(|| format!("feature '{}' has no type", token))?;
    let ftype = token[..first]
        .parse::<u32>()
        .map_err(|_| format!("invalid feature type in '{}'", token))?;
    let last = bytes.rfind_byte(b':').unwrap_or(first);
    if last > first + 1 {
        if let Ok(weight) = token[last + 1..].parse::<f64>() {
            return Ok((ftype, &token[first + 1..last], Some(weight)));
        }
    }
    Ok((ftype, &token[first + 1..], None))
}

impl<R: BufRead> Iterator for InstanceReader<R> {
    type Item = Result<StringInstance>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.lines.advance()? {
            Ok(_) => Some(self.parse_line()),
            Err(err) => Some(Err(err)),
        }
    }
}

/// Reads [`SparseInstance`]s whose features are already indexed
///
/// ```text
/// label index index ...
/// label index:weight index:weight ...
/// ```
#[derive(Debug)]
pub struct SparseInstanceReader<R> {
    lines: Lines<R>,
}

impl<R: BufRead> SparseInstanceReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: Lines::new(reader),
        }
    }

    fn parse_line(&self) -> Result<SparseInstance> {
        let line = self.lines.line;
        let (label, tokens) = self.lines.split()?;
        let mut features: Option<SparseFeatureVector> = None;
        for token in tokens {
            let (index, weight) = match token.split_once(':') {
                Some((index, weight)) => {
                    let weight = weight
                        .parse::<f64>()
                        .map_err(|_| parse_error(line, format!("invalid weight in '{}'", token)))?;
                    (index, Some(weight))
                }
                None => (token, None),
            };
            let index = index
                .parse::<usize>()
                .map_err(|_| parse_error(line, format!("invalid feature index in '{}'", token)))?;
            let x = features.get_or_insert_with(|| {
                if weight.is_some() {
                    SparseFeatureVector::weighted()
                } else {
                    SparseFeatureVector::new()
                }
            });
            match (x.has_weight(), weight) {
                (true, Some(weight)) => x.add_weighted_feature(index, weight),
                (false, None) => x.add_feature(index),
                _ => {
                    return Err(parse_error(
                        line,
                        "weighted and unweighted features are mixed",
                    ))
                }
            }
        }
        Ok(SparseInstance::new(label, features.unwrap_or_default()))
    }
}

impl<R: BufRead> Iterator for SparseInstanceReader<R> {
    type Item = Result<SparseInstance>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.lines.advance()? {
            Ok(_) => Some(self.parse_line()),
            Err(err) => Some(Err(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(text: &str) -> Vec<Result<StringInstance>> {
        InstanceReader::new(text.as_bytes()).collect()
    }

    #[test]
    fn test_read_unweighted() {
        let instances = read("sunny 0:walk 1:shop\n\n  rainy 0:clean\n");
        assert_eq!(instances.len(), 2);
        let first = instances[0].as_ref().unwrap();
        assert_eq!(first.label, "sunny");
        assert!(!first.features.has_weight());
        assert_eq!(first.features.value(1), "shop");
        assert_eq!(instances[1].as_ref().unwrap().features.ftype(0), 0);
    }

    #[test]
    fn test_read_weighted() {
        let instances = read("male 0:jinho:2 2:s:0.5\n");
        let x = &instances[0].as_ref().unwrap().features;
        assert!(x.has_weight());
        assert_eq!(x.iter().collect::<Vec<_>>(), vec![(0, "jinho", 2.0), (2, "s", 0.5)]);
    }

    #[test]
    fn test_value_may_contain_colons() {
        assert_eq!(parse_feature("3:a:b").unwrap(), (3, "a:b", None));
        assert_eq!(parse_feature("3::1").unwrap(), (3, ":1", None));
        assert_eq!(parse_feature("3:12:30:1.5").unwrap(), (3, "12:30", Some(1.5)));
    }

    #[test]
    fn test_malformed_lines() {
        let instances = read("a 0:x\nb x\n");
        assert!(instances[0].is_ok());
        match &instances[1] {
            Err(Error::Parse { line, .. }) => assert_eq!(*line, 2),
            other => panic!("unexpected {:?}", other),
        }

        assert!(read("a z:x\n")[0].is_err());
        assert!(read("a 0:x:1 0:y\n")[0].is_err());
        assert!(read("a 0:x 0:y:1\n")[0].is_err());
    }

    #[test]
    fn test_read_sparse() {
        let text = "rainy 3 1 4\ncloudy 2:0.5 7:1.5\n\nsunny\n";
        let instances: Vec<_> = SparseInstanceReader::new(text.as_bytes())
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(instances.len(), 3);
        assert_eq!(instances[0].features.to_string(), "3 1 4");
        assert_eq!(instances[1].features.to_string(), "2:0.5 7:1.5");
        assert!(instances[2].features.is_empty());

        let bad: Vec<_> = SparseInstanceReader::new("a 1 x\n".as_bytes()).collect();
        assert!(matches!(bad[0], Err(Error::Parse { line: 1, .. })));
        let mixed: Vec<_> = SparseInstanceReader::new("a 1 2:1\n".as_bytes()).collect();
        assert!(mixed[0].is_err());
    }
}
