//! Two-Stage Departure Coupler
//!
//! Creates the decision variables of a sub-problem. Arrivals get one binary
//! per surviving (flight, carrier, heading) triple. A departure whose arrival
//! was solved on the planned day inherits that carrier and only chooses a
//! heading. A departure without such an arrival chooses carrier and heading
//! jointly through `z[f, carrier]`, `r[f, heading]` and their conjunction
//! `y[f, heading, carrier]`.
//!
//! Every variable that says "flight f flies carrier c on heading h" ends up as
//! a `Cell`, so the constraint families see one uniform population.

use crate::candidates::CandidatePairs;
use crate::constraints::ConstraintFamily;
use crate::model::{Carrier, Direction, Flight, Market, Route, Stage};
use crate::solver::{LinearExpr, MilpModel, Relation, VarId};
use std::collections::BTreeMap;

/// Add the three rows making `y = a AND b` for binaries `a`, `b` and `y`:
/// `y ≤ a`, `y ≤ b`, `y ≥ a + b − 1`.
pub fn link_and(model: &mut MilpModel, y: VarId, a: VarId, b: VarId, name: &str) {
    let mut le_a = LinearExpr::sum([y]);
    le_a.add_term(a, -1.0);
    model.add_linear_constraint(
        le_a,
        Relation::LessEq,
        0.0,
        format!("{name}_le_carrier"),
        ConstraintFamily::Coupling,
    );

    let mut le_b = LinearExpr::sum([y]);
    le_b.add_term(b, -1.0);
    model.add_linear_constraint(
        le_b,
        Relation::LessEq,
        0.0,
        format!("{name}_le_route"),
        ConstraintFamily::Coupling,
    );

    let mut ge_both = LinearExpr::sum([y]);
    ge_both.add_term(a, -1.0);
    ge_both.add_term(b, -1.0);
    model.add_linear_constraint(
        ge_both,
        Relation::GreaterEq,
        -1.0,
        format!("{name}_ge_both"),
        ConstraintFamily::Coupling,
    );
}

/// How the carrier of a flight is decided
#[derive(Debug, Clone, PartialEq)]
pub enum CarrierChoice {
    /// Carrier and heading chosen together by the cell binaries
    Direct,
    /// Carrier fixed by the paired arrival
    Inherited(usize),
    /// Carrier chosen by `z` variables, coupled to the heading choice
    Coupled(Vec<(usize, VarId)>),
}

/// One "flight f flies carrier c on heading h" binary
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    pub flight: usize,
    pub carrier: usize,
    pub route: usize,
    pub var: VarId,
}

/// Decision variables of one sub-problem and aggregate expressions over them
#[derive(Debug)]
pub struct AssignmentSpace<'a> {
    pub stage: Stage,
    pub flights: Vec<&'a Flight>,
    pub carriers: &'a [Carrier],
    pub routes: Vec<&'a Route>,
    pub cells: Vec<Cell>,
    pub choices: Vec<CarrierChoice>,
    /// Market of the planned-day departure paired with each arrival
    pub paired_departure: Vec<Option<Market>>,
    by_flight: Vec<Vec<usize>>,
}

impl<'a> AssignmentSpace<'a> {
    /// Create all variables. `fixed[i]` is the inherited carrier of flight `i`;
    /// for departures, `None` means the carrier is decided here.
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        model: &mut MilpModel,
        stage: Stage,
        flights: Vec<&'a Flight>,
        fixed: &[Option<usize>],
        candidates: &[CandidatePairs],
        carriers: &'a [Carrier],
        routes: Vec<&'a Route>,
        paired_departure: Vec<Option<Market>>,
    ) -> Self {
        let mut cells = Vec::new();
        let mut choices = Vec::with_capacity(flights.len());
        let mut by_flight = vec![Vec::new(); flights.len()];

        for (f, flight) in flights.iter().enumerate() {
            let pairs = &candidates[f];
            let choice = match (stage.direction, fixed[f]) {
                (_, Some(carrier)) => {
                    for &(c, r) in pairs {
                        let var = model.add_binary_variable(format!(
                            "x_{}_{}_{}",
                            flight.id, carriers[c].name, routes[r].name
                        ));
                        by_flight[f].push(cells.len());
                        cells.push(Cell { flight: f, carrier: c, route: r, var });
                    }
                    CarrierChoice::Inherited(carrier)
                }
                (Direction::Arrival, None) => {
                    for &(c, r) in pairs {
                        let var = model.add_binary_variable(format!(
                            "x_{}_{}_{}",
                            flight.id, carriers[c].name, routes[r].name
                        ));
                        by_flight[f].push(cells.len());
                        cells.push(Cell { flight: f, carrier: c, route: r, var });
                    }
                    CarrierChoice::Direct
                }
                (Direction::Departure, None) => {
                    let z = Self::couple(
                        model,
                        flight,
                        pairs,
                        carriers,
                        &routes,
                        f,
                        &mut cells,
                        &mut by_flight[f],
                    );
                    CarrierChoice::Coupled(z)
                }
            };
            choices.push(choice);
        }

        AssignmentSpace {
            stage,
            flights,
            carriers,
            routes,
            cells,
            choices,
            paired_departure,
            by_flight,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn couple(
        model: &mut MilpModel,
        flight: &Flight,
        pairs: &CandidatePairs,
        carriers: &[Carrier],
        routes: &[&Route],
        f: usize,
        cells: &mut Vec<Cell>,
        flight_cells: &mut Vec<usize>,
    ) -> Vec<(usize, VarId)> {
        let mut z: BTreeMap<usize, VarId> = BTreeMap::new();
        let mut r: BTreeMap<usize, VarId> = BTreeMap::new();
        for &(c, h) in pairs {
            z.entry(c).or_insert_with(|| {
                model.add_binary_variable(format!("z_{}_{}", flight.id, carriers[c].name))
            });
            r.entry(h).or_insert_with(|| {
                model.add_binary_variable(format!("r_{}_{}", flight.id, routes[h].name))
            });
        }

        model.add_linear_constraint(
            LinearExpr::sum(z.values().copied()),
            Relation::Equal,
            1.0,
            format!("one_carrier_{}", flight.id),
            ConstraintFamily::Coupling,
        );
        model.add_linear_constraint(
            LinearExpr::sum(r.values().copied()),
            Relation::Equal,
            1.0,
            format!("one_route_{}", flight.id),
            ConstraintFamily::Coupling,
        );

        for &(c, h) in pairs {
            let y = model.add_binary_variable(format!(
                "y_{}_{}_{}",
                flight.id, routes[h].name, carriers[c].name
            ));
            link_and(
                model,
                y,
                z[&c],
                r[&h],
                &format!("couple_{}_{}_{}", flight.id, carriers[c].name, routes[h].name),
            );
            flight_cells.push(cells.len());
            cells.push(Cell { flight: f, carrier: c, route: h, var: y });
        }

        z.into_iter().collect()
    }

    pub fn cells_of(&self, flight: usize) -> impl Iterator<Item = &Cell> {
        self.by_flight[flight].iter().map(|&i| &self.cells[i])
    }

    /// 1 if flight `flight` is given to `carrier`, as an expression
    pub fn carrier_load(&self, flight: usize, carrier: usize) -> LinearExpr {
        match &self.choices[flight] {
            CarrierChoice::Inherited(c) => {
                LinearExpr::constant(if *c == carrier { 1.0 } else { 0.0 })
            }
            CarrierChoice::Coupled(z) => LinearExpr::sum(
                z.iter().filter(|(c, _)| *c == carrier).map(|&(_, v)| v),
            ),
            CarrierChoice::Direct => LinearExpr::sum(
                self.cells_of(flight)
                    .filter(|cell| cell.carrier == carrier)
                    .map(|cell| cell.var),
            ),
        }
    }

    /// Flights given to `carrier` among those matching `filter`
    pub fn carrier_total(&self, carrier: usize, filter: impl Fn(&Flight) -> bool) -> LinearExpr {
        let mut total = LinearExpr::new();
        for (f, flight) in self.flights.iter().enumerate() {
            if filter(flight) {
                total.add_scaled(&self.carrier_load(f, carrier), 1.0);
            }
        }
        total
    }

    /// Flights given to `carrier` whose carrier was inherited
    pub fn inherited_count(&self, carrier: usize) -> usize {
        self.choices
            .iter()
            .filter(|c| matches!(c, CarrierChoice::Inherited(x) if *x == carrier))
            .count()
    }

    /// Cells matching a predicate, summed
    pub fn cell_total(&self, filter: impl Fn(&Cell, &Flight) -> bool) -> LinearExpr {
        LinearExpr::sum(
            self.cells
                .iter()
                .filter(|cell| filter(cell, self.flights[cell.flight]))
                .map(|cell| cell.var),
        )
    }

    /// Whether `carrier` can receive any flight in this sub-problem
    pub fn carrier_reachable(&self, carrier: usize) -> bool {
        self.choices.iter().enumerate().any(|(f, choice)| match choice {
            CarrierChoice::Inherited(c) => *c == carrier,
            CarrierChoice::Coupled(z) => z.iter().any(|(c, _)| *c == carrier),
            CarrierChoice::Direct => self.cells_of(f).any(|cell| cell.carrier == carrier),
        })
    }

    /// Arrivals given to `carrier` whose planned-day departure is in `market`
    pub fn paired_demand(&self, carrier: usize, market: Market) -> LinearExpr {
        let mut total = LinearExpr::new();
        for (f, paired) in self.paired_departure.iter().enumerate() {
            if *paired == Some(market) {
                total.add_scaled(&self.carrier_load(f, carrier), 1.0);
            }
        }
        total
    }

    pub fn route_index(&self, name: &str) -> Option<usize> {
        self.routes.iter().position(|r| r.name == name)
    }
}
