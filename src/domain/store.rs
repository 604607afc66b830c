//! Entity arena and the tape aggregate.
//!
//! Every domain object lives in a per-run [`Registry`]: typed buckets keyed
//! by a single monotonic id counter, with a secondary name index for
//! exchanges and companies. Identifiers are process-local and not stable
//! across runs; the on-disk format uses positional indices instead (see the
//! tape file adapter). Single-threaded use only; there is no locking.

use std::collections::HashMap;

use crate::domain::entities::{Company, Datapoint, Exchange};
use crate::domain::error::TapesimError;

/// Opaque handle to an entity in a [`Registry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id(u32);

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Typed entity arena with name lookup.
#[derive(Debug, Default)]
pub struct Registry {
    next_id: u32,
    exchanges: HashMap<Id, Exchange>,
    companies: HashMap<Id, Company>,
    datapoints: HashMap<Id, Datapoint>,
    names: HashMap<String, Id>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self) -> Id {
        let id = Id(self.next_id);
        self.next_id += 1;
        id
    }

    /// Reject a name already present in the index.
    fn reserve_name(&self, name: &str) -> Result<(), TapesimError> {
        if self.names.contains_key(name) {
            return Err(TapesimError::DuplicateName { name: name.into() });
        }
        Ok(())
    }

    pub fn add_exchange(&mut self, exchange: Exchange) -> Id {
        let id = self.allocate();
        let previous = self.exchanges.insert(id, exchange);
        assert!(previous.is_none(), "id {id} allocated twice");
        id
    }

    pub fn add_exchange_named(&mut self, exchange: Exchange) -> Result<Id, TapesimError> {
        self.reserve_name(&exchange.name)?;
        let name = exchange.name.clone();
        let id = self.add_exchange(exchange);
        self.names.insert(name, id);
        Ok(id)
    }

    pub fn add_company(&mut self, company: Company) -> Id {
        let id = self.allocate();
        let previous = self.companies.insert(id, company);
        assert!(previous.is_none(), "id {id} allocated twice");
        id
    }

    pub fn add_company_named(&mut self, company: Company) -> Result<Id, TapesimError> {
        self.reserve_name(&company.name)?;
        let name = company.name.clone();
        let id = self.add_company(company);
        self.names.insert(name, id);
        Ok(id)
    }

    pub fn add_datapoint(&mut self, datapoint: Datapoint) -> Id {
        let id = self.allocate();
        let previous = self.datapoints.insert(id, datapoint);
        assert!(previous.is_none(), "id {id} allocated twice");
        id
    }

    pub fn exchange(&self, id: Id) -> Result<&Exchange, TapesimError> {
        self.exchanges.get(&id).ok_or(TapesimError::Dangling {
            kind: "exchange",
            id,
        })
    }

    pub fn company(&self, id: Id) -> Result<&Company, TapesimError> {
        self.companies.get(&id).ok_or(TapesimError::Dangling {
            kind: "company",
            id,
        })
    }

    pub fn datapoint(&self, id: Id) -> Result<&Datapoint, TapesimError> {
        self.datapoints.get(&id).ok_or(TapesimError::Dangling {
            kind: "datapoint",
            id,
        })
    }

    /// Look up an entity id by registered name.
    pub fn id_of(&self, name: &str) -> Result<Id, TapesimError> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| TapesimError::UnknownName { name: name.into() })
    }

    pub fn exchange_by_name(&self, name: &str) -> Result<&Exchange, TapesimError> {
        self.exchange(self.id_of(name)?)
    }

    pub fn company_by_name(&self, name: &str) -> Result<&Company, TapesimError> {
        self.company(self.id_of(name)?)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    /// Remove an entity from its type bucket. No cascade: callers must make
    /// sure nothing still references the id. Name index entries for the id
    /// are dropped with it.
    pub fn destroy(&mut self, id: Id) -> Result<(), TapesimError> {
        let found = self.exchanges.remove(&id).is_some()
            || self.companies.remove(&id).is_some()
            || self.datapoints.remove(&id).is_some();
        if !found {
            return Err(TapesimError::Dangling { kind: "entity", id });
        }
        self.names.retain(|_, v| *v != id);
        Ok(())
    }
}

/// The working set shared by the codec and the replay engine: ordered
/// exchange and company membership plus each company's datapoint series.
///
/// Membership lists are rebuilt fresh by every load and rewritten fresh by
/// every save; they are not a live view.
#[derive(Debug, Default)]
pub struct Tape {
    pub registry: Registry,
    pub exchanges: Vec<Id>,
    pub companies: Vec<Id>,
    pub series: HashMap<Id, Vec<Id>>,
}

impl Tape {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_exchange(
        &mut self,
        name: &str,
        country: &str,
        city: &str,
    ) -> Result<Id, TapesimError> {
        let id = self.registry.add_exchange_named(Exchange {
            name: name.into(),
            country: country.into(),
            city: city.into(),
        })?;
        self.exchanges.push(id);
        Ok(id)
    }

    /// Create a company listed on an exchange already present in this tape.
    pub fn new_company(
        &mut self,
        name: &str,
        ticker: &str,
        exchange: Id,
    ) -> Result<Id, TapesimError> {
        if !self.exchanges.contains(&exchange) {
            return Err(TapesimError::Dangling {
                kind: "exchange",
                id: exchange,
            });
        }
        let id = self
            .registry
            .add_company_named(Company::new(name.into(), ticker.into(), exchange))?;
        self.companies.push(id);
        self.series.entry(id).or_default();
        Ok(id)
    }

    /// Append a price observation to its company's series.
    pub fn new_datapoint(&mut self, datapoint: Datapoint) -> Result<Id, TapesimError> {
        let company = datapoint.company_id();
        if !self.companies.contains(&company) {
            return Err(TapesimError::Dangling {
                kind: "company",
                id: company,
            });
        }
        let id = self.registry.add_datapoint(datapoint);
        self.series.entry(company).or_default().push(id);
        Ok(id)
    }

    pub fn exchange(&self, id: Id) -> Result<&Exchange, TapesimError> {
        self.registry.exchange(id)
    }

    pub fn company(&self, id: Id) -> Result<&Company, TapesimError> {
        self.registry.company(id)
    }

    pub fn datapoint(&self, id: Id) -> Result<&Datapoint, TapesimError> {
        self.registry.datapoint(id)
    }

    /// Datapoint ids for a company, in insertion order.
    pub fn series_of(&self, company: Id) -> &[Id] {
        self.series.get(&company).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn find_ticker(&self, ticker: &str) -> Option<Id> {
        self.companies
            .iter()
            .copied()
            .find(|&id| matches!(self.registry.company(id), Ok(c) if c.ticker == ticker))
    }
}
