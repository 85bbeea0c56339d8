/*
    CAS Library (Common Analysis Structure)

        Licensed under the GNU General Public License v3
*/

//! This module contains the generic storage primitives: an arena ([`Store`]) that owns items,
//! lightweight [`Handle`]s that refer to them, and the [`ResultItem`] fat pointer that pairs
//! a borrowed item with the store that owns it.

use sealed::sealed;
use std::hash::Hash;
use std::ops::Deref;
use std::slice::Iter;

use crate::config::Configurable;
use crate::error::CasError;
use crate::types::*;

/// Type for Store elements. The struct that owns a field of this type should implement the trait [`StoreFor<T>`]
pub type Store<T> = Vec<Option<T>>;

/// The handle trait is implemented on various handle types. They have in common that refer to the internal id
/// a [`Storable`] item in a [`Store`] by index. Types implementing this are lightweigt and do not borrow anything, they can be passed and copied freely.
/// This is a sealed trait, not implementable outside this crate.
#[sealed(pub(crate))] //<-- this ensures nobody outside this crate can implement the trait
pub trait Handle:
    Clone + Copy + core::fmt::Debug + PartialEq + Eq + PartialOrd + Ord + Hash
{
    /// Create a new handle for an internal ID. You shouldn't need to use this as handles will always be generated for you by higher-level functions.
    fn new(intid: usize) -> Self;
    /// Returns the internal index for this handle
    fn as_usize(&self) -> usize;
}

#[sealed(pub(crate))] //<-- this ensures nobody outside this crate can implement the trait
pub trait Storable: PartialEq + TypeInfo
where
    Self: Sized,
{
    type HandleType: Handle;
    type StoreType: StoreFor<Self>;

    /// Retrieve the internal (numeric) id. This may be None only in the initial
    /// stage when the item is still unbound to a store.
    fn handle(&self) -> Option<Self::HandleType>;

    /// Set the internal ID. May only be called once, by the store that takes ownership.
    fn set_handle(&mut self, handle: Self::HandleType);

    /// Wraps the item in a [`ResultItem`] along with a reference to the store that owns it.
    fn as_resultitem<'store>(
        &'store self,
        store: &'store Self::StoreType,
    ) -> ResultItem<'store, Self> {
        ResultItem::new(self, store)
    }
}

/// This trait is implemented on types that provide storage for a certain other generic type (T)
/// It is a sealed trait, not implementable outside this crate.
#[sealed(pub(crate))] //<-- this ensures nobody outside this crate can implement the trait
pub trait StoreFor<T: Storable>: Configurable {
    /// Get a reference to the entire store for the associated type
    fn store(&self) -> &Store<T>;
    /// Get a mutable reference to the entire store for the associated type
    fn store_mut(&mut self) -> &mut Store<T>;

    fn store_typeinfo() -> &'static str;

    /// Adds an item to the store. Returns a handle to it upon success.
    fn insert(&mut self, mut item: T) -> Result<T::HandleType, CasError> {
        if item.handle().is_some() {
            return Err(CasError::HandleError("item is already bound to a store"));
        }
        let handle = self.next_handle();
        item.set_handle(handle);

        self.preinsert(&mut item)?;

        self.store_mut().push(Some(item));

        self.inserted(handle)?;

        debug(self.config(), || {
            format!(
                "StoreFor<{}>.insert: {:?} (insertion complete now)",
                Self::store_typeinfo(),
                handle
            )
        });

        Ok(handle)
    }

    /// Called prior to inserting an item into to the store
    /// If it returns an error, the insert will be cancelled.
    #[allow(unused_variables)]
    fn preinsert(&self, item: &mut T) -> Result<(), CasError> {
        //default implementation does nothing
        Ok(())
    }

    /// Called after an item was inserted to the store
    /// Allows the store to do further bookkeeping
    #[allow(unused_variables)]
    fn inserted(&mut self, handle: T::HandleType) -> Result<(), CasError> {
        //default implementation does nothing
        Ok(())
    }

    /// Returns true if the store has the item
    fn has(&self, handle: T::HandleType) -> bool {
        matches!(self.store().get(handle.as_usize()), Some(Some(_)))
    }

    /// Get a reference to an item from the store by handle
    fn get(&self, handle: T::HandleType) -> Result<&T, CasError> {
        if let Some(Some(item)) = self.store().get(handle.as_usize()) {
            Ok(item)
        } else {
            Err(CasError::HandleError(Self::store_typeinfo()))
        }
    }

    /// Get a mutable reference to an item from the store by handle
    fn get_mut(&mut self, handle: T::HandleType) -> Result<&mut T, CasError> {
        if let Some(Some(item)) = self.store_mut().get_mut(handle.as_usize()) {
            Ok(item)
        } else {
            Err(CasError::HandleError(Self::store_typeinfo()))
        }
    }

    /// Iterate over the store
    fn iter<'a>(&'a self) -> StoreIter<'a, T>
    where
        T: Storable<StoreType = Self>,
    {
        StoreIter {
            store: self,
            iter: self.store().iter(),
        }
    }

    /// Return the internal id that will be assigned for the next item to the store
    fn next_handle(&self) -> T::HandleType {
        T::HandleType::new(self.store().len()) //this is one of the very few places in the code where we create a handle from scratch
    }
}

/// This is the iterator to iterate over a Store,  it is created by the iter() method from the [`StoreFor<T>`] trait
/// It produces references to the items wrapped in a [`ResultItem<T>`].
pub struct StoreIter<'store, T>
where
    T: Storable,
{
    store: &'store T::StoreType,
    iter: Iter<'store, Option<T>>,
}

impl<'store, T> Iterator for StoreIter<'store, T>
where
    T: Storable,
{
    type Item = ResultItem<'store, T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.iter.next() {
                Some(Some(item)) => return Some(item.as_resultitem(self.store)),
                Some(None) => continue,
                None => return None,
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        //deleted items are skipped so we can only give an upper bound
        (0, self.iter.size_hint().1)
    }
}

/// This is a smart pointer that encapsulates both the item and the store that owns it.
/// It allows the item to have some more introspection as it knows who its immediate parent is,
/// the higher-level API is implemented on it.
pub struct ResultItem<'store, T>
where
    T: Storable,
{
    item: &'store T,
    store: &'store T::StoreType,
}

impl<'store, T> Clone for ResultItem<'store, T>
where
    T: Storable,
{
    fn clone(&self) -> Self {
        *self
    }
}

impl<'store, T> Copy for ResultItem<'store, T> where T: Storable {}

impl<'store, T> core::fmt::Debug for ResultItem<'store, T>
where
    T: Storable + core::fmt::Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("ResultItem").field(self.item).finish()
    }
}

impl<'store, T> Deref for ResultItem<'store, T>
where
    T: Storable,
{
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.item
    }
}

impl<'store, T> PartialEq for ResultItem<'store, T>
where
    T: Storable,
{
    fn eq(&self, other: &Self) -> bool {
        self.item.handle() == other.item.handle() && self.item == other.item
    }
}

impl<'store, T> ResultItem<'store, T>
where
    T: Storable,
{
    pub(crate) fn new(item: &'store T, store: &'store T::StoreType) -> Self {
        Self { item, store }
    }

    /// Returns the contained reference with the original lifetime, unlike [`Self::deref()`]
    pub fn as_ref(&self) -> &'store T {
        self.item
    }

    pub fn store(&self) -> &'store T::StoreType {
        self.store
    }

    /// Returns the handle of the item. Items in a ResultItem are always bound.
    pub fn handle(&self) -> T::HandleType {
        self.item
            .handle()
            .expect("handle was already guaranteed for ResultItem, this should always work")
    }
}
