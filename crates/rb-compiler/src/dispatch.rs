//! Selection among the cases of a multi-dispatch method.

use crate::compiler::FunctionCompiler;
use crate::matcher::CaseOutcome;
use crate::method::MethodCase;
use crate::staged::StagedValue;
use itertools::Itertools;
use rb_core::ir::{Ir, RaiseKind};
use rb_core::value::Ty;
use rb_core::Result;

impl FunctionCompiler {
    /// Compiles the dispatch of `actual` over `cases`: the cheapest matching
    /// case wins, a tie at the cheapest cost is ambiguous, and no match at all
    /// raises `NoMatch`. When every outcome is known while compiling only the
    /// winning body is emitted.
    pub fn compile_match_cases(
        &mut self,
        actual: StagedValue,
        cases: &[MethodCase],
        method: &str,
    ) -> Result<StagedValue> {
        let mut instrs = vec![];
        let actual = self.materialize(actual, &mut instrs);
        let mut outcomes = Vec::with_capacity(cases.len());
        for case in cases {
            let outcome = self.compile_match_case(&actual, case.case(), case.scope())?;
            if outcome.success.as_bool() != Some(false) {
                outcomes.push(outcome);
            }
        }
        rb_core::trace!(
            "{}: {} of {} cases may match",
            method,
            outcomes.len(),
            cases.len()
        );

        let result = match outcomes.iter().map(CaseOutcome::static_cost).collect::<Option<Vec<_>>>() {
            Some(costs) => self.select_static(&actual, outcomes, &costs, method),
            None => self.select_dynamic(&actual, outcomes, method, &mut instrs),
        };
        if instrs.is_empty() {
            return Ok(result);
        }
        let ty = result.ty.clone();
        instrs.push(result.into_ir());
        Ok(StagedValue::dynamic(Ir::seq(instrs), ty))
    }

    fn select_static(
        &self,
        actual: &StagedValue,
        outcomes: Vec<CaseOutcome>,
        costs: &[i64],
        method: &str,
    ) -> StagedValue {
        let Some(best) = costs.iter().copied().min() else {
            return raise(RaiseKind::NoMatch { method: method.to_string() }, vec![actual.to_ir()]);
        };
        let mut winners = costs.iter().positions(|cost| *cost == best);
        match (winners.next(), winners.next()) {
            (Some(winner), None) => outcomes
                .into_iter()
                .nth(winner)
                .map(|outcome| outcome.body)
                .unwrap_or_else(StagedValue::unit),
            _ => raise(
                RaiseKind::AmbiguousMatch { method: method.to_string() },
                vec![actual.to_ir(), Ir::int(best)],
            ),
        }
    }

    fn select_dynamic(
        &mut self,
        actual: &StagedValue,
        outcomes: Vec<CaseOutcome>,
        method: &str,
        instrs: &mut Vec<Ir>,
    ) -> StagedValue {
        let best = self.new_local();
        let ties = self.new_local();
        let winner = self.new_local();

        let mut slots = Vec::with_capacity(outcomes.len());
        let mut bodies = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            let ok = self.new_local();
            let cost = self.new_local();
            instrs.push(Ir::assign(ok, outcome.success.into_ir()));
            instrs.push(Ir::when(Ir::Local(ok), Ir::assign(cost, outcome.cost.into_ir())));
            slots.push((ok, cost));
            bodies.push(outcome.body);
        }

        instrs.push(Ir::assign(best, Ir::int(i64::MAX)));
        for (ok, cost) in &slots {
            instrs.push(Ir::when(
                Ir::Local(*ok),
                Ir::when(
                    Ir::IntLess(Ir::Local(*cost).into(), Ir::Local(best).into()),
                    Ir::assign(best, Ir::Local(*cost)),
                ),
            ));
        }
        instrs.push(Ir::assign(ties, Ir::int(0)));
        instrs.push(Ir::assign(winner, Ir::int(-1)));
        for (index, (ok, cost)) in slots.iter().enumerate() {
            instrs.push(Ir::when(
                Ir::Local(*ok),
                Ir::when(
                    Ir::IntEq(Ir::Local(*cost).into(), Ir::Local(best).into()),
                    Ir::seq([
                        Ir::assign(ties, Ir::IntAdd(Ir::Local(ties).into(), Ir::int(1).into())),
                        Ir::assign(winner, Ir::int(index as i64)),
                    ]),
                ),
            ));
        }

        let ty = Ty::common_of(bodies.iter().map(|body| body.ty.clone()));
        let mut selected = raise(
            RaiseKind::NoMatch { method: method.to_string() },
            vec![actual.to_ir()],
        )
        .into_ir();
        for (index, body) in bodies.into_iter().enumerate().rev() {
            selected = Ir::if_(
                Ir::IntEq(Ir::Local(winner).into(), Ir::int(index as i64).into()),
                body.into_ir(),
                selected,
            );
        }
        let ambiguous = raise(
            RaiseKind::AmbiguousMatch { method: method.to_string() },
            vec![actual.to_ir(), Ir::Local(best)],
        );
        let no_match = raise(
            RaiseKind::NoMatch { method: method.to_string() },
            vec![actual.to_ir()],
        );
        StagedValue::dynamic(
            Ir::if_(
                Ir::IntEq(Ir::Local(ties).into(), Ir::int(0).into()),
                no_match.into_ir(),
                Ir::if_(
                    Ir::IntLess(Ir::int(1).into(), Ir::Local(ties).into()),
                    ambiguous.into_ir(),
                    selected,
                ),
            ),
            ty,
        )
    }
}

fn raise(kind: RaiseKind, operands: Vec<Ir>) -> StagedValue {
    StagedValue::dynamic(Ir::Raise { kind, operands }, Ty::Never)
}
