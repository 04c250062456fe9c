// Copyright (c) The depfinder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    errors::{InvalidRecordError, RecordMergeError, RecordParseError},
    TestName, TestOutcome,
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt, str::FromStr};

/// Labels for each of the six lines of the textual record format, in order.
const LABELS: [&str; 6] = [
    "Test",
    "Intended behavior",
    "when executed after",
    "and executed before",
    "The revealed behavior",
    "in the order",
];

/// One discovered dependency of a target test.
///
/// A record states that `target` produces its `intended` outcome only if every test in
/// `before_tests` runs before it and every test in `after_tests` runs after it. The
/// `revealing_order` is the exact order that was executed to observe `revealed` instead.
///
/// Records are immutable once constructed: merging two records produces a new record.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", try_from = "DependencyRecordSerde")]
pub struct DependencyRecord {
    target: TestName,
    intended: TestOutcome,
    before_tests: BTreeSet<TestName>,
    after_tests: BTreeSet<TestName>,
    revealed: TestOutcome,
    revealing_order: Vec<TestName>,
}

impl DependencyRecord {
    /// Creates a new `DependencyRecord`, checking its invariants.
    ///
    /// Returns an error if both dependency sets are empty, if the target is listed among its
    /// own dependencies, if a test appears in both sets, or if any test name can't be
    /// represented in the textual form.
    pub fn new(
        target: TestName,
        intended: TestOutcome,
        before_tests: BTreeSet<TestName>,
        after_tests: BTreeSet<TestName>,
        revealed: TestOutcome,
        revealing_order: Vec<TestName>,
    ) -> Result<Self, InvalidRecordError> {
        let record = Self {
            target,
            intended,
            before_tests,
            after_tests,
            revealed,
            revealing_order,
        };
        record.validate()?;
        Ok(record)
    }

    /// Returns the target test.
    pub fn target(&self) -> &TestName {
        &self.target
    }

    /// Returns the outcome of the target in the original order.
    pub fn intended(&self) -> TestOutcome {
        self.intended
    }

    /// Returns the tests that must run before the target.
    pub fn before_tests(&self) -> &BTreeSet<TestName> {
        &self.before_tests
    }

    /// Returns the tests that must run after the target.
    pub fn after_tests(&self) -> &BTreeSet<TestName> {
        &self.after_tests
    }

    /// Returns the outcome observed when the dependency was not honored.
    pub fn revealed(&self) -> TestOutcome {
        self.revealed
    }

    /// Returns the order that was executed to observe [`Self::revealed`].
    pub fn revealing_order(&self) -> &[TestName] {
        &self.revealing_order
    }

    /// Returns true if `test` is a before- or after-dependency in this record.
    pub fn depends_on(&self, test: &str) -> bool {
        self.before_tests.contains(test) || self.after_tests.contains(test)
    }

    /// Merges `other` into this record, producing a new record.
    ///
    /// Both records must share the target and the intended outcome. The dependency sets are
    /// unioned; the revealed outcome and revealing order of `self` are kept. Merging a record
    /// with itself returns an identical record.
    pub fn merge(&self, other: &DependencyRecord) -> Result<Self, RecordMergeError> {
        if self.target != other.target {
            return Err(RecordMergeError::TargetMismatch {
                left: self.target.clone(),
                right: other.target.clone(),
            });
        }
        if self.intended != other.intended {
            return Err(RecordMergeError::IntendedMismatch {
                target: self.target.clone(),
                left: self.intended,
                right: other.intended,
            });
        }

        Self::new(
            self.target.clone(),
            self.intended,
            self.before_tests.union(&other.before_tests).cloned().collect(),
            self.after_tests.union(&other.after_tests).cloned().collect(),
            self.revealed,
            self.revealing_order.clone(),
        )
        .map_err(RecordMergeError::Invalid)
    }

    /// Returns a copy of `order` rearranged so that it honors this record.
    ///
    /// Each before-test is placed immediately before the target if it is missing or follows
    /// the target. Each after-test that precedes the target is moved to directly after it.
    /// Orders that don't contain the target are returned unchanged.
    pub fn fix_order(&self, order: &[TestName]) -> Vec<TestName> {
        self.fix_order_except(order, &[])
    }

    /// Like [`Self::fix_order`], but leaves every test in `pinned` where it is.
    ///
    /// A pinned before-test missing from `order` is not inserted either.
    pub fn fix_order_except(&self, order: &[TestName], pinned: &[TestName]) -> Vec<TestName> {
        let mut order = order.to_vec();
        let Some(mut target_index) = position_of(&order, &self.target) else {
            return order;
        };

        for test in self.before_tests.iter().filter(|test| !pinned.contains(test)) {
            match position_of(&order, test) {
                Some(index) if index < target_index => {}
                Some(index) => {
                    order.remove(index);
                    order.insert(target_index, test.clone());
                    target_index += 1;
                }
                None => {
                    order.insert(target_index, test.clone());
                    target_index += 1;
                }
            }
        }

        for test in self.after_tests.iter().filter(|test| !pinned.contains(test)) {
            if let Some(index) = position_of(&order, test)
                && index < target_index
            {
                order.remove(index);
                target_index -= 1;
                order.insert(target_index + 1, test.clone());
            }
        }

        order
    }

    // ---
    // Helper methods
    // ---

    fn validate(&self) -> Result<(), InvalidRecordError> {
        let all_names = std::iter::once(&self.target)
            .chain(&self.before_tests)
            .chain(&self.after_tests)
            .chain(&self.revealing_order);
        for name in all_names {
            if !name.is_portable() {
                return Err(InvalidRecordError::InvalidTestName { name: name.clone() });
            }
        }

        if self.before_tests.is_empty() && self.after_tests.is_empty() {
            return Err(InvalidRecordError::NoDependencies {
                target: self.target.clone(),
            });
        }
        if self.depends_on(self.target.as_str()) {
            return Err(InvalidRecordError::SelfDependency {
                target: self.target.clone(),
            });
        }
        if let Some(test) = self.before_tests.intersection(&self.after_tests).next() {
            return Err(InvalidRecordError::Conflicting {
                target: self.target.clone(),
                test: test.clone(),
            });
        }

        Ok(())
    }
}

fn position_of(order: &[TestName], test: &TestName) -> Option<usize> {
    order.iter().position(|t| t == test)
}

/// Writes the six-line textual form. There is no trailing newline.
impl fmt::Display for DependencyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}: {}", LABELS[0], self.target)?;
        writeln!(f, "{}: {}", LABELS[1], self.intended)?;
        writeln!(f, "{}: {}", LABELS[2], DisplayList(&self.before_tests))?;
        writeln!(f, "{}: {}", LABELS[3], DisplayList(&self.after_tests))?;
        writeln!(f, "{}: {}", LABELS[4], self.revealed)?;
        write!(f, "{}: {}", LABELS[5], DisplayList(&self.revealing_order))
    }
}

/// Writes a bracketed list of names, escaping list syntax inside each name with a backslash.
struct DisplayList<'a, I>(&'a I);

impl<'a, I> fmt::Display for DisplayList<'a, I>
where
    &'a I: IntoIterator<Item = &'a TestName>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, test) in self.0.into_iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            for c in test.as_str().chars() {
                if matches!(c, '\\' | ',' | ']') {
                    f.write_str("\\")?;
                }
                write!(f, "{c}")?;
            }
        }
        f.write_str("]")
    }
}

impl FromStr for DependencyRecord {
    type Err = RecordParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lines: Vec<&str> = s.lines().collect();
        if lines.len() != LABELS.len() {
            return Err(RecordParseError::LineCount {
                expected: LABELS.len(),
                actual: lines.len(),
            });
        }

        let mut values = [""; 6];
        for (index, (line, expected)) in lines.iter().zip(LABELS).enumerate() {
            let (label, value) = line
                .split_once(": ")
                .ok_or(RecordParseError::MissingSeparator { line: index + 1 })?;
            if label != expected {
                return Err(RecordParseError::UnexpectedLabel {
                    line: index + 1,
                    expected,
                    actual: label.to_owned(),
                });
            }
            // The target keeps its exact spelling, including surrounding whitespace.
            values[index] = if index == 0 { value } else { value.trim() };
        }

        let parse_outcome = |line: usize| {
            values[line - 1]
                .parse::<TestOutcome>()
                .map_err(|err| RecordParseError::Outcome { line, err })
        };

        Self::new(
            TestName::new(values[0]),
            parse_outcome(2)?,
            parse_list(3, values[2])?.into_iter().collect(),
            parse_list(4, values[3])?.into_iter().collect(),
            parse_outcome(5)?,
            parse_list(6, values[5])?,
        )
        .map_err(RecordParseError::Invalid)
    }
}

fn parse_list(line: usize, value: &str) -> Result<Vec<TestName>, RecordParseError> {
    let malformed = || RecordParseError::MalformedList {
        line,
        value: value.to_owned(),
    };

    let inner = value
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(malformed)?;
    if inner.is_empty() {
        return Ok(Vec::new());
    }

    let mut tests = Vec::new();
    let mut current = String::new();
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => current.push(chars.next().ok_or_else(malformed)?),
            ',' => {
                tests.push(finish_item(&mut current).ok_or_else(malformed)?);
                // Items are separated by ", ".
                if chars.as_str().starts_with(' ') {
                    chars.next();
                }
            }
            ']' => return Err(malformed()),
            c => current.push(c),
        }
    }
    tests.push(finish_item(&mut current).ok_or_else(malformed)?);

    Ok(tests)
}

fn finish_item(current: &mut String) -> Option<TestName> {
    let item = std::mem::take(current);
    (!item.is_empty()).then(|| TestName::from(item))
}

/// Deserialized form of a record, validated on conversion.
#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct DependencyRecordSerde {
    target: TestName,
    intended: TestOutcome,
    #[serde(default)]
    before_tests: BTreeSet<TestName>,
    #[serde(default)]
    after_tests: BTreeSet<TestName>,
    revealed: TestOutcome,
    #[serde(default)]
    revealing_order: Vec<TestName>,
}

impl TryFrom<DependencyRecordSerde> for DependencyRecord {
    type Error = InvalidRecordError;

    fn try_from(value: DependencyRecordSerde) -> Result<Self, Self::Error> {
        Self::new(
            value.target,
            value.intended,
            value.before_tests,
            value.after_tests,
            value.revealed,
            value.revealing_order,
        )
    }
}
