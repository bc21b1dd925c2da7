//! Iterators which are parallel if the `parallel` feature is enabled and sequential otherwise.

#[cfg(feature = "parallel")]
mod inner {
    use rayon::prelude::*;

    pub trait MaybeParallelRefIterator<'data> {
        type Iter: IndexedParallelIterator;

        fn maybe_par_iter(&'data self) -> Self::Iter;
    }

    impl<'data, T: Sync + 'data> MaybeParallelRefIterator<'data> for [T] {
        type Iter = rayon::slice::Iter<'data, T>;

        fn maybe_par_iter(&'data self) -> Self::Iter {
            self.par_iter()
        }
    }

    impl<'data, T: Sync + 'data> MaybeParallelRefIterator<'data> for Vec<T> {
        type Iter = rayon::slice::Iter<'data, T>;

        fn maybe_par_iter(&'data self) -> Self::Iter {
            self.par_iter()
        }
    }
}

#[cfg(not(feature = "parallel"))]
mod inner {
    pub trait MaybeParallelRefIterator<'data> {
        type Iter: Iterator;

        fn maybe_par_iter(&'data self) -> Self::Iter;
    }

    impl<'data, T: 'data> MaybeParallelRefIterator<'data> for [T] {
        type Iter = std::slice::Iter<'data, T>;

        fn maybe_par_iter(&'data self) -> Self::Iter {
            self.iter()
        }
    }

    impl<'data, T: 'data> MaybeParallelRefIterator<'data> for Vec<T> {
        type Iter = std::slice::Iter<'data, T>;

        fn maybe_par_iter(&'data self) -> Self::Iter {
            self.iter()
        }
    }
}

pub use inner::MaybeParallelRefIterator;
