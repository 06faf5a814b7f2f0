use std::convert::Infallible;

use bindery::prelude::*;

#[derive(Clone)]
pub struct Test1;

#[fragment]
impl Test1 {
    #[inject]
    pub fn new() -> Self {
        todo!()
    }
}

#[derive(Clone)]
pub struct Test2;

#[fragment]
impl Test2 {
    #[inject]
    pub fn new() -> Test2 {
        todo!()
    }
}

#[derive(Clone)]
pub struct Test3;

#[fragment]
impl Test3 {
    #[inject]
    pub fn new() -> Result<Self, Infallible> {
        todo!()
    }
}

#[derive(Clone)]
pub struct Test4;

#[fragment]
impl Test4 {
    #[inject]
    pub fn new() -> Result<Test4, Infallible> {
        todo!()
    }
}

#[derive(Clone)]
pub struct Test5;

#[fragment]
impl Test5 {
    #[inject]
    pub fn new() -> std::result::Result<Test5, Infallible> {
        todo!()
    }
}

fn main() {}
