//! Line diff for full resynchronization.
//!
//! Operations are produced top to bottom and are meant to be applied in that
//! order: each one is expressed in the coordinates of the text as already
//! modified by its predecessors.

use crate::edit::LineEdit;

/// Replacement of lines `[start, end)` by `lines`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineOp {
	/// First replaced line.
	pub start: usize,
	/// End of the replaced range, exclusive.
	pub end: usize,
	/// Replacement lines.
	pub lines: Vec<String>,
}

impl From<LineOp> for LineEdit {
	fn from(op: LineOp) -> Self {
		Self::new(op.start, op.end, op.lines)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
	Keep,
	Delete,
	Insert,
}

/// Computes the operations turning `old` into `new`.
///
/// Uses Myers' shortest edit script, so changed ranges are minimal; ties are
/// broken the same way on every run. Memory stays linear in the input size.
pub fn diff_lines<S: AsRef<str>>(old: &[S], new: &[S]) -> Vec<LineOp> {
	let prefix = old.iter().zip(new).take_while(|(a, b)| a.as_ref() == b.as_ref()).count();
	let suffix = old[prefix..]
		.iter()
		.rev()
		.zip(new[prefix..].iter().rev())
		.take_while(|(a, b)| a.as_ref() == b.as_ref())
		.count();
	let old_mid = &old[prefix..old.len() - suffix];
	let new_mid = &new[prefix..new.len() - suffix];

	let mut ops = Vec::new();
	let (mut x, mut y) = (0, 0);
	let steps = shortest_edit(old_mid, new_mid);
	let mut steps = steps.iter().peekable();
	while let Some(step) = steps.next() {
		if *step == Step::Keep {
			x += 1;
			y += 1;
			continue;
		}
		let (x0, y0) = (x, y);
		let mut next = Some(step);
		while let Some(step) = next {
			match step {
				Step::Delete => x += 1,
				Step::Insert => y += 1,
				Step::Keep => unreachable!("hunks end before the next kept line"),
			}
			next = steps.next_if(|s| **s != Step::Keep);
		}
		// Earlier hunks were applied already, so old and new agree up to y0.
		let start = prefix + y0;
		ops.push(LineOp {
			start,
			end: start + (x - x0),
			lines: new_mid[y0..y].iter().map(|s| s.as_ref().to_owned()).collect(),
		});
	}
	ops
}

/// Myers' edit script in linear space.
fn shortest_edit<S: AsRef<str>>(old: &[S], new: &[S]) -> Vec<Step> {
	let mut steps = Vec::with_capacity(old.len() + new.len());
	walk(old, new, &mut steps);
	steps
}

fn walk<S: AsRef<str>>(old: &[S], new: &[S], steps: &mut Vec<Step>) {
	let prefix = old.iter().zip(new).take_while(|(a, b)| a.as_ref() == b.as_ref()).count();
	let (old, new) = (&old[prefix..], &new[prefix..]);
	let suffix = old.iter().rev().zip(new.iter().rev()).take_while(|(a, b)| a.as_ref() == b.as_ref()).count();
	let (old, new) = (&old[..old.len() - suffix], &new[..new.len() - suffix]);

	steps.extend(std::iter::repeat_n(Step::Keep, prefix));
	if old.is_empty() || new.is_empty() {
		steps.extend(std::iter::repeat_n(Step::Delete, old.len()));
		steps.extend(std::iter::repeat_n(Step::Insert, new.len()));
	} else if let Some((x, y)) = middle_snake(old, new) {
		walk(&old[..x], &new[..y], steps);
		walk(&old[x..], &new[y..], steps);
	} else {
		steps.extend(std::iter::repeat_n(Step::Delete, old.len()));
		steps.extend(std::iter::repeat_n(Step::Insert, new.len()));
	}
	steps.extend(std::iter::repeat_n(Step::Keep, suffix));
}

/// Searches forward from the start and backward from the end until the two
/// frontiers overlap, returning a point on a shortest path that splits it in
/// two halves of near equal cost. Both inputs are non-empty and differ in
/// their first and last lines.
fn middle_snake<S: AsRef<str>>(old: &[S], new: &[S]) -> Option<(usize, usize)> {
	let (n, m) = (old.len() as isize, new.len() as isize);
	let max_d = (n + m + 1) / 2;
	let offset = max_d;
	let len = (2 * max_d + 2) as usize;
	let mut forward = vec![-1isize; len];
	let mut backward = vec![-1isize; len];
	forward[(offset + 1) as usize] = 0;
	backward[(offset + 1) as usize] = 0;
	let delta = n - m;
	let odd = delta % 2 != 0;
	let eq = |x: isize, y: isize| old[x as usize].as_ref() == new[y as usize].as_ref();
	// Diagonals that left the grid are skipped from then on.
	let (mut f_start, mut f_end, mut b_start, mut b_end) = (0, 0, 0, 0);

	for d in 0..max_d {
		let mut k = -d + f_start;
		while k <= d - f_end {
			let at = (offset + k) as usize;
			let mut x = if k == -d || (k != d && forward[at - 1] < forward[at + 1]) {
				forward[at + 1]
			} else {
				forward[at - 1] + 1
			};
			let mut y = x - k;
			while x < n && y < m && eq(x, y) {
				x += 1;
				y += 1;
			}
			forward[at] = x;
			if x > n {
				f_end += 2;
			} else if y > m {
				f_start += 2;
			} else if odd {
				let other = offset + delta - k;
				if (0..len as isize).contains(&other) && backward[other as usize] != -1 && x >= n - backward[other as usize] {
					return Some((x as usize, y as usize));
				}
			}
			k += 2;
		}

		let mut k = -d + b_start;
		while k <= d - b_end {
			let at = (offset + k) as usize;
			let mut x = if k == -d || (k != d && backward[at - 1] < backward[at + 1]) {
				backward[at + 1]
			} else {
				backward[at - 1] + 1
			};
			let mut y = x - k;
			while x < n && y < m && eq(n - x - 1, m - y - 1) {
				x += 1;
				y += 1;
			}
			backward[at] = x;
			if x > n {
				b_end += 2;
			} else if y > m {
				b_start += 2;
			} else if !odd {
				let other = offset + delta - k;
				if (0..len as isize).contains(&other) && forward[other as usize] != -1 {
					let fx = forward[other as usize];
					let fy = fx - (other - offset);
					if fx >= n - x {
						return Some((fx as usize, fy as usize));
					}
				}
			}
			k += 2;
		}
	}
	None
}
