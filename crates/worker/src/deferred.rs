//! Lazily-run, single-shot computations with success and failure branches.

use std::fmt;
use std::future::{Future, IntoFuture};

use futures::future::{BoxFuture, FutureExt};
use tokio::task::JoinHandle;

use crate::{TaskClass, spawn};

/// A computation that does nothing until it is run, and runs at most once.
///
/// Combinators build a chain without starting any work; each step starts only
/// after the previous one completed, so a chain of remote calls reaches the
/// remote in causal order. Running consumes the value, which makes a second
/// run of the same computation unrepresentable.
#[must_use = "a deferred computation does nothing until it is run"]
pub struct Deferred<T, E> {
	fut: BoxFuture<'static, Result<T, E>>,
}

impl<T, E> fmt::Debug for Deferred<T, E> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Deferred").finish_non_exhaustive()
	}
}

impl<T, E> Deferred<T, E>
where
	T: Send + 'static,
	E: Send + 'static,
{
	/// Wraps a future. Futures are inert until polled, so nothing runs yet.
	pub fn new<F>(fut: F) -> Self
	where
		F: Future<Output = Result<T, E>> + Send + 'static,
	{
		Self { fut: fut.boxed() }
	}

	/// Wraps a synchronous task, executed when the computation runs.
	pub fn from_fn(f: impl FnOnce() -> Result<T, E> + Send + 'static) -> Self {
		Self::new(async move { f() })
	}

	/// An already-successful computation.
	pub fn ok(value: T) -> Self {
		Self::new(std::future::ready(Ok(value)))
	}

	/// An already-failed computation.
	pub fn err(error: E) -> Self {
		Self::new(std::future::ready(Err(error)))
	}

	/// Transforms the success value.
	pub fn map<U, F>(self, f: F) -> Deferred<U, E>
	where
		U: Send + 'static,
		F: FnOnce(T) -> U + Send + 'static,
	{
		Deferred::new(self.fut.map(|res| res.map(f)))
	}

	/// Sequences another computation after a success.
	pub fn and_then<U, F>(self, f: F) -> Deferred<U, E>
	where
		U: Send + 'static,
		F: FnOnce(T) -> Deferred<U, E> + Send + 'static,
	{
		Deferred::new(async move {
			let value = self.fut.await?;
			f(value).fut.await
		})
	}

	/// Transforms the failure value.
	pub fn map_err<E2, F>(self, f: F) -> Deferred<T, E2>
	where
		E2: Send + 'static,
		F: FnOnce(E) -> E2 + Send + 'static,
	{
		Deferred::new(self.fut.map(|res| res.map_err(f)))
	}

	/// Replaces a failure with the outcome of another computation.
	pub fn recover<F>(self, f: F) -> Self
	where
		F: FnOnce(E) -> Deferred<T, E> + Send + 'static,
	{
		Self::new(async move {
			match self.fut.await {
				Ok(value) => Ok(value),
				Err(err) => f(err).fut.await,
			}
		})
	}

	/// Runs a side effect on the outcome without changing it.
	pub fn inspect<F>(self, f: F) -> Self
	where
		F: FnOnce(&Result<T, E>) + Send + 'static,
	{
		Self::new(self.fut.map(|res| {
			f(&res);
			res
		}))
	}

	/// Runs the computation on the current task.
	pub async fn run(self) -> Result<T, E> {
		self.fut.await
	}

	/// Runs the computation on its own task.
	pub fn spawn(self, class: TaskClass) -> JoinHandle<Result<T, E>> {
		spawn(class, self.fut)
	}
}

impl<T, E> IntoFuture for Deferred<T, E> {
	type Output = Result<T, E>;
	type IntoFuture = BoxFuture<'static, Result<T, E>>;

	fn into_future(self) -> Self::IntoFuture {
		self.fut
	}
}
