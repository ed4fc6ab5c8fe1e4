/*
    Nyx, blazing fast astrodynamics
    Copyright (C) 2018-onwards Christopher Rabotin <christopher.rabotin@gmail.com>

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

/* NOTE: The Horner evaluation is effectively a clone of bacon-sci, MIT License, by Wyatt Campbell. */

use std::f64::EPSILON;
use std::fmt;
use std::ops;

/// Polynomial is a dynamically sized polynomial, used for the Taylor series of frequency models.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Polynomial {
    /// Coefficients are orders by their power, e.g. index 0 is to the power 0, 1 is linear, 2 is quadratic, etc.
    pub coefficients: Vec<f64>,
}

impl Polynomial {
    pub fn new(coefficients: Vec<f64>) -> Self {
        Self { coefficients }
    }

    /// Returns true if this polynomial has no coefficients at all, not even a constant.
    pub fn is_empty(&self) -> bool {
        self.coefficients.is_empty()
    }

    /// Get the order of the polynomial, or None if it has no coefficients.
    pub fn order(&self) -> Option<usize> {
        self.coefficients.len().checked_sub(1)
    }

    /// Evaluate the polynomial at the provided position
    pub fn eval(&self, x: f64) -> f64 {
        self.eval_n_deriv(x).0
    }

    /// Evaluate the derivative at the provided position
    pub fn deriv(&self, x: f64) -> f64 {
        self.eval_n_deriv(x).1
    }

    /// Evaluate the polynomial and its derivative at the provided position
    pub fn eval_n_deriv(&self, x: f64) -> (f64, f64) {
        let size = self.coefficients.len();
        match size {
            0 => (0.0, 0.0),
            1 => (self.coefficients[0], 0.0),
            _ => {
                // Start with biggest coefficients
                let mut acc_eval = self.coefficients[size - 1];
                let mut acc_deriv = self.coefficients[size - 1];
                // For every coefficient except the constant and largest
                for val in self.coefficients.iter().skip(1).rev().skip(1) {
                    acc_eval = acc_eval * x + *val;
                    acc_deriv = acc_deriv * x + acc_eval;
                }
                // Do the constant for the polynomial evaluation
                acc_eval = x * acc_eval + self.coefficients[0];

                (acc_eval, acc_deriv)
            }
        }
    }

    /// Returns the partials of the evaluation with respect to each coefficient, i.e. `[1, x, x^2, ...]`.
    pub fn basis(&self, x: f64) -> Vec<f64> {
        let mut basis = Vec::with_capacity(self.coefficients.len());
        let mut power = 1.0;
        for _ in 0..self.coefficients.len() {
            basis.push(power);
            power *= x;
        }
        basis
    }

    /// Returns true if any of the coefficients are NaN
    pub fn is_nan(&self) -> bool {
        self.coefficients.iter().any(|c| c.is_nan())
    }

    fn fmt_with_var(&self, f: &mut fmt::Formatter, var: &str) -> fmt::Result {
        write!(f, "P({}) = ", var)?;
        let mut data = Vec::with_capacity(self.coefficients.len());

        for (i, c) in self.coefficients.iter().enumerate().rev() {
            if c.abs() <= EPSILON {
                continue;
            }

            let mut d;
            if c.abs() > 100.0 || c.abs() < 0.01 {
                // Use scientific notation
                if c > &0.0 {
                    d = format!("+{:e}", c);
                } else {
                    d = format!("{:e}", c);
                }
            } else if c > &0.0 {
                d = format!("+{}", c);
            } else {
                d = format!("{}", c);
            }
            match i {
                0 => {}
                1 => d = format!("{}{}", d, var),
                _ => d = format!("{}{}^{}", d, var, i),
            }
            data.push(d);
        }
        write!(f, "{}", data.join(" "))
    }
}

/// In-place multiplication of a polynomial with an f64
impl ops::Mul<f64> for Polynomial {
    type Output = Polynomial;

    fn mul(mut self, rhs: f64) -> Self::Output {
        for val in &mut self.coefficients {
            *val *= rhs;
        }
        self
    }
}

impl fmt::Display for Polynomial {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.fmt_with_var(f, "t")
    }
}
